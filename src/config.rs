// src/config.rs
//! Sector configuration: one declarative TOML document per sector.
//!
//! Weights, thresholds and the CPV/keyword tables are sector-specific;
//! validation happens once at load so a skewed document is rejected before
//! any cycle runs. In particular the four scoring weights must sum to 1.0 —
//! silently tolerating a skewed sum would distort every total.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::feed::types::AnalysisType;
use crate::scoring::{ScoringWeights, TierThresholds};
use crate::signals::cpv::{CpvCategory, DirectOverride};
use crate::signals::keywords::KeywordTier;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Deserialize)]
pub struct SectorSection {
    pub name: String,
}

/// Feed URLs by analysis type. A sector may track only one side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsSection {
    #[serde(default)]
    pub tender: Option<String>,
    #[serde(default)]
    pub award: Option<String>,
}

fn default_discard_below() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    pub optimal_amount: f64,
    /// Totals strictly below this are dropped before persistence
    /// (an intentional rejection, counted separately from failures).
    #[serde(default = "default_discard_below")]
    pub discard_below: u32,
    pub weights: ScoringWeights,
    #[serde(default)]
    pub thresholds: TierThresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpvSection {
    #[serde(default)]
    pub direct: Option<DirectOverride>,
    /// Declared order matters; see the CPV matcher.
    #[serde(default)]
    pub categories: Vec<CpvCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordsSection {
    #[serde(default)]
    pub tiers: Vec<KeywordTier>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorConfig {
    pub sector: SectorSection,
    #[serde(default)]
    pub feeds: FeedsSection,
    pub scoring: ScoringSection,
    pub cpv: CpvSection,
    pub keywords: KeywordsSection,
}

impl SectorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: SectorConfig = toml::from_str(content).context("parsing sector config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sector config at {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("in sector config {}", path.display()))
    }

    pub fn feed_url(&self, analysis_type: AnalysisType) -> Option<&str> {
        match analysis_type {
            AnalysisType::Tender => self.feeds.tender.as_deref(),
            AnalysisType::Award => self.feeds.award.as_deref(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sector.name.trim().is_empty() {
            bail!("sector name must not be empty");
        }

        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("scoring weights must sum to 1.0, got {sum}");
        }

        let t = self.scoring.thresholds;
        if !(t.top >= t.mid && t.mid >= t.low) {
            bail!("tier thresholds must be descending: top >= mid >= low");
        }

        if self.scoring.optimal_amount <= 0.0 {
            bail!("optimal_amount must be positive");
        }

        for cat in &self.cpv.categories {
            if cat.codes.is_empty() {
                bail!("cpv category `{}` has no codes", cat.name);
            }
            for code in &cat.codes {
                if !code.chars().take(8).all(|c| c.is_ascii_digit()) || code.len() < 8 {
                    bail!("cpv category `{}` code `{code}` is not an 8-digit code", cat.name);
                }
            }
        }

        for tier in &self.keywords.tiers {
            if tier.weight < 0.0 {
                bail!("keyword tier `{}` has a negative weight", tier.name);
            }
        }

        Ok(())
    }
}

/// Load every `*.toml` under a directory, one sector each. Sorted by file
/// name so cycle order is stable.
pub fn load_sector_dir(dir: &Path) -> Result<Vec<SectorConfig>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading sector config dir {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
        .collect();
    paths.sort();

    paths.iter().map(|p| SectorConfig::from_path(p)).collect()
}
