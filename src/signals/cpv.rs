// src/signals/cpv.rs
//! CPV classification matcher.
//!
//! The category map is an ordered list, not a set: a full (8-digit) match
//! stops the scan at the first hit, while a partial (4-digit) match only
//! records a candidate and keeps scanning for a better partial. That
//! asymmetry is order-dependent and is kept exactly as configured sectors
//! rely on it.

use serde::Deserialize;

use crate::signals::SignalResult;

/// One configured CPV category, in declared order.
#[derive(Debug, Clone, Deserialize)]
pub struct CpvCategory {
    pub name: String,
    pub weight: u32,
    /// 8-digit CPV codes (check digits and dashes tolerated).
    pub codes: Vec<String>,
}

fn default_direct_weight() -> u32 {
    100
}

/// Optional direct override: the one code a sector cares most about.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectOverride {
    pub code: String,
    #[serde(default = "default_direct_weight")]
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct CpvMatcher {
    categories: Vec<CpvCategory>,
    direct: Option<DirectOverride>,
}

/// Keep the leading digits only: `"71355100-2"` → `"71355100"`.
fn normalize_cpv(code: &str) -> String {
    code.chars().take_while(|c| c.is_ascii_digit()).collect()
}

fn prefix_match(a: &str, b: &str, len: usize) -> bool {
    a.len() >= len && b.len() >= len && a[..len] == b[..len]
}

impl CpvMatcher {
    pub fn new(categories: Vec<CpvCategory>, direct: Option<DirectOverride>) -> Self {
        Self { categories, direct }
    }

    pub fn score(&self, cpv_code: &str) -> SignalResult {
        let code = normalize_cpv(cpv_code);
        if code.is_empty() {
            return SignalResult::none();
        }

        // Direct override takes precedence over every category.
        if let Some(direct) = &self.direct {
            let target = normalize_cpv(&direct.code);
            if prefix_match(&code, &target, 8) {
                return SignalResult {
                    score: direct.weight.min(100),
                    matches: vec![direct.code.clone()],
                    category: Some("direct".to_string()),
                };
            }
        }

        let mut partial: Option<(u32, String, String)> = None; // (score, code, category)
        for cat in &self.categories {
            for configured in &cat.codes {
                let target = normalize_cpv(configured);
                if prefix_match(&code, &target, 8) {
                    // Full match wins immediately over any partial found so far.
                    return SignalResult {
                        score: cat.weight.min(100),
                        matches: vec![configured.clone()],
                        category: Some(cat.name.clone()),
                    };
                }
                if prefix_match(&code, &target, 4) {
                    let candidate = cat.weight / 2;
                    if partial.as_ref().map(|(s, _, _)| candidate > *s).unwrap_or(true) {
                        partial = Some((candidate, configured.clone(), cat.name.clone()));
                    }
                }
            }
        }

        match partial {
            Some((score, code, category)) => SignalResult {
                score: score.min(100),
                matches: vec![code],
                category: Some(category),
            },
            None => SignalResult::none(),
        }
    }
}
