// src/signals/mod.rs
//! Independent per-entry signal extractors. Each scores an entry 0–100 on
//! its own axis; the scoring engine combines them.

pub mod cpv;
pub mod keywords;

use serde::{Deserialize, Serialize};

/// Output of one extractor, independent of the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    /// Always clamped to [0, 100].
    pub score: u32,
    /// What matched: configured CPV codes or keyword literals.
    pub matches: Vec<String>,
    /// Category/tier that produced the score, when one did.
    pub category: Option<String>,
}

impl SignalResult {
    pub fn none() -> Self {
        Self::default()
    }
}
