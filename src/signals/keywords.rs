// src/signals/keywords.rs
//! Keyword matcher over title + description + CPV description.
//!
//! Short tokens (≤ 4 chars, think "BIM", "GIS", "SIG") are matched on word
//! boundaries so they do not fire inside unrelated longer words; anything
//! longer uses plain case-insensitive substring containment.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::signals::SignalResult;

const SHORT_WORD_MAX: usize = 4;

/// One named keyword tier as configured per sector.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordTier {
    pub name: String,
    pub weight: f64,
    pub words: Vec<String>,
}

enum WordPattern {
    /// Whole-word boundary match, case-insensitive.
    Boundary(Regex),
    /// Lowercased substring containment.
    Substring(String),
}

struct CompiledWord {
    literal: String,
    pattern: WordPattern,
}

struct CompiledTier {
    name: String,
    weight: f64,
    words: Vec<CompiledWord>,
}

pub struct KeywordMatcher {
    tiers: Vec<CompiledTier>,
}

impl KeywordMatcher {
    /// Compile all word patterns once; scoring is then allocation-light.
    pub fn new(tiers: Vec<KeywordTier>) -> Result<Self> {
        let mut compiled = Vec::with_capacity(tiers.len());
        for tier in tiers {
            let mut words = Vec::with_capacity(tier.words.len());
            for word in &tier.words {
                let pattern = if word.chars().count() <= SHORT_WORD_MAX {
                    let re = Regex::new(&format!(r"(?iu)\b{}\b", regex::escape(word)))
                        .with_context(|| format!("keyword pattern for `{word}`"))?;
                    WordPattern::Boundary(re)
                } else {
                    WordPattern::Substring(word.to_lowercase())
                };
                words.push(CompiledWord {
                    literal: word.clone(),
                    pattern,
                });
            }
            compiled.push(CompiledTier {
                name: tier.name,
                weight: tier.weight,
                words,
            });
        }
        Ok(Self { tiers: compiled })
    }

    pub fn score(&self, title: &str, description: &str, cpv_description: &str) -> SignalResult {
        let haystack = format!("{title} {description} {cpv_description}").to_lowercase();

        let mut weighted_sum = 0.0_f64;
        let mut weight_total = 0.0_f64;
        let mut all_matches: Vec<String> = Vec::new();
        let mut best: Option<(usize, String)> = None; // (distinct matches, tier name)

        for tier in &self.tiers {
            let mut distinct = 0usize;
            for word in &tier.words {
                let hit = match &word.pattern {
                    WordPattern::Boundary(re) => re.is_match(&haystack),
                    WordPattern::Substring(w) => haystack.contains(w.as_str()),
                };
                if hit {
                    distinct += 1;
                    all_matches.push(word.literal.clone());
                }
            }

            let sub_score = (20 * distinct).min(100) as f64;
            if tier.weight > 0.0 {
                weighted_sum += sub_score * tier.weight;
                weight_total += tier.weight;
            }
            if distinct > 0 && best.as_ref().map(|(n, _)| distinct > *n).unwrap_or(true) {
                best = Some((distinct, tier.name.clone()));
            }
        }

        let score = if weight_total > 0.0 {
            (weighted_sum / weight_total) as u32
        } else if !all_matches.is_empty() {
            // No tier carries weight but words still matched.
            ((15 * all_matches.len()) as u32).min(100)
        } else {
            0
        };

        SignalResult {
            score: score.min(100),
            matches: all_matches,
            category: best.map(|(_, name)| name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::new(vec![
            KeywordTier {
                name: "core".into(),
                weight: 3.0,
                words: vec![
                    "topograf\u{ed}a".into(),
                    "cartograf\u{ed}a".into(),
                    "fotogrametr\u{ed}a".into(),
                    "GIS".into(),
                    "BIM".into(),
                ],
            },
            KeywordTier {
                name: "secundario".into(),
                weight: 1.0,
                words: vec!["levantamiento".into(), "deslinde".into()],
            },
        ])
        .unwrap()
    }

    #[test]
    fn short_words_require_word_boundaries() {
        let m = matcher();
        // "gis" buried inside a longer token must not fire.
        let r = m.score("registro", "sistema regislativo", "");
        assert_eq!(r.score, 0);
        let r = m.score("Plataforma GIS municipal", "", "");
        assert!(r.score > 0);
        assert_eq!(r.matches, vec!["GIS".to_string()]);
    }

    #[test]
    fn long_words_match_as_substrings_case_insensitive() {
        let m = matcher();
        let r = m.score("SERVICIOS DE TOPOGRAF\u{cd}A URBANA", "", "");
        assert!(r.score > 0);
        assert_eq!(r.category.as_deref(), Some("core"));
    }

    #[test]
    fn per_tier_subscore_is_monotonic_in_distinct_matches() {
        let m = matcher();
        let one = m.score("topograf\u{ed}a", "", "").score;
        let two = m.score("topograf\u{ed}a y cartograf\u{ed}a", "", "").score;
        let three = m
            .score("topograf\u{ed}a, cartograf\u{ed}a y fotogrametr\u{ed}a", "", "")
            .score;
        assert!(one <= two && two <= three);
        assert!(three <= 100);
    }

    #[test]
    fn weighted_average_uses_normalized_tier_weights() {
        let m = matcher();
        // One core match (sub 20, weight 3) + one secondary match (sub 20,
        // weight 1) → 20 regardless of absolute weights.
        let r = m.score("topograf\u{ed}a y levantamiento", "", "");
        assert_eq!(r.score, 20);
    }

    #[test]
    fn zero_weight_tiers_fall_back_to_flat_scoring() {
        let m = KeywordMatcher::new(vec![KeywordTier {
            name: "sin_peso".into(),
            weight: 0.0,
            words: vec!["batimetr\u{ed}a".into(), "deslinde".into()],
        }])
        .unwrap();
        let r = m.score("batimetr\u{ed}a y deslinde de costas", "", "");
        assert_eq!(r.score, 30); // 15 per distinct match
    }

    #[test]
    fn cpv_description_participates_in_matching() {
        let m = matcher();
        let r = m.score("Contrato de servicios", "", "Servicios de cartograf\u{ed}a");
        assert!(r.score > 0);
    }
}
