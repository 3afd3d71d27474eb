// src/scoring.rs
//! Combines the per-entry signals into a `ScoreBreakdown` and a tier.
//!
//! Sub-scores and the weighted total truncate to integers (`as u32`, not
//! `round`); tier boundaries and the documented score tables assume this.

use serde::{Deserialize, Serialize};

/// Discrete priority bucket, derived from the total score against
/// descending thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Mid,
    Low,
    Reject,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Top => "top",
            Tier::Mid => "mid",
            Tier::Low => "low",
            Tier::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cpv: u32,
    pub keywords: u32,
    pub amount: u32,
    pub urgency: u32,
    /// Always within [0, 100].
    pub total: u32,
    pub tier: Tier,
}

/// Relative weights of the four signals. Must sum to 1.0; validated at
/// config load, not here.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoringWeights {
    pub cpv: f64,
    pub keywords: f64,
    pub amount: f64,
    pub urgency: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.cpv + self.keywords + self.amount + self.urgency
    }
}

fn default_top() -> u32 {
    85
}
fn default_mid() -> u32 {
    70
}
fn default_low() -> u32 {
    50
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TierThresholds {
    #[serde(default = "default_top")]
    pub top: u32,
    #[serde(default = "default_mid")]
    pub mid: u32,
    #[serde(default = "default_low")]
    pub low: u32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            top: default_top(),
            mid: default_mid(),
            low: default_low(),
        }
    }
}

pub struct ScoringEngine {
    weights: ScoringWeights,
    thresholds: TierThresholds,
    optimal_amount: f64,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights, thresholds: TierThresholds, optimal_amount: f64) -> Self {
        Self {
            weights,
            thresholds,
            optimal_amount,
        }
    }

    /// Economic-value sub-score: how close the budget sits to the sector's
    /// sweet spot. Missing or non-positive amounts score a neutral 30.
    pub fn amount_score(&self, amount: Option<f64>) -> u32 {
        let Some(amount) = amount.filter(|a| *a > 0.0) else {
            return 30;
        };
        if self.optimal_amount <= 0.0 {
            return 30;
        }
        let ratio = amount / self.optimal_amount;
        if ratio < 0.1 {
            20
        } else if ratio < 0.5 {
            (40.0 + ratio * 60.0) as u32
        } else if ratio <= 2.0 {
            (80.0 + (1.0 - (1.0 - ratio).abs()) * 20.0) as u32
        } else if ratio <= 5.0 {
            70
        } else {
            50
        }
    }

    /// Time-urgency sub-score from days until the submission deadline.
    /// Already-expired deadlines are near-worthless, not urgent.
    pub fn urgency_score(days_until_deadline: Option<i64>) -> u32 {
        match days_until_deadline {
            None => 50,
            Some(d) if d <= 0 => 10,
            Some(d) if d <= 3 => 100,
            Some(d) if d <= 7 => 90,
            Some(d) if d <= 14 => 75,
            Some(d) if d <= 30 => 60,
            Some(_) => 40,
        }
    }

    pub fn compute(
        &self,
        cpv: u32,
        keywords: u32,
        amount: Option<f64>,
        days_until_deadline: Option<i64>,
    ) -> ScoreBreakdown {
        let amount_score = self.amount_score(amount);
        let urgency = Self::urgency_score(days_until_deadline);

        let weighted = cpv.min(100) as f64 * self.weights.cpv
            + keywords.min(100) as f64 * self.weights.keywords
            + amount_score as f64 * self.weights.amount
            + urgency as f64 * self.weights.urgency;
        let total = (weighted.max(0.0) as u32).min(100);

        ScoreBreakdown {
            cpv: cpv.min(100),
            keywords: keywords.min(100),
            amount: amount_score,
            urgency,
            total,
            tier: self.tier_for(total),
        }
    }

    /// Highest threshold met, descending order.
    pub fn tier_for(&self, total: u32) -> Tier {
        if total >= self.thresholds.top {
            Tier::Top
        } else if total >= self.thresholds.mid {
            Tier::Mid
        } else if total >= self.thresholds.low {
            Tier::Low
        } else {
            Tier::Reject
        }
    }
}
