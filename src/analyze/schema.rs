// src/analyze/schema.rs
//! Output contract of the analysis cascade, plus extraction of the JSON
//! block providers embed in free-form prose.
//!
//! The top-level keys are fixed: the CRM layer consumes them for lead
//! creation. Missing optional fields resolve to safe defaults (empty lists,
//! `"desconocido"`, confidence 0.5) so downstream code never branches on
//! absence.

use serde::{Deserialize, Serialize};

fn default_tier() -> String {
    "desconocido".to_string()
}

fn default_confidence() -> f32 {
    0.5
}

/// Deep analysis of one opportunity's source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub score: f32,
    #[serde(default = "default_tier")]
    pub tier: String,
    /// Technical components detected in the document (equipment, services).
    #[serde(default)]
    pub detected_components: Vec<String>,
    /// Pain/need descriptors a salesperson can open with.
    #[serde(default)]
    pub pain_points: Vec<String>,
    /// People or roles worth contacting.
    #[serde(default)]
    pub contact_leads: Vec<String>,
    /// Ready-to-use outreach text.
    #[serde(default)]
    pub outreach_text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Which provider produced this; `"basico"` means the deterministic
    /// fallback. Set by the chain, never by the provider response.
    #[serde(default)]
    pub provider_used: String,
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self {
            score: 0.0,
            tier: default_tier(),
            detected_components: Vec::new(),
            pain_points: Vec::new(),
            contact_leads: Vec::new(),
            outreach_text: String::new(),
            confidence: default_confidence(),
            provider_used: String::new(),
        }
    }
}

/// Extract the first balanced `{...}` block from free-form text, aware of
/// JSON strings and escapes so braces inside strings do not unbalance it.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a provider's free-form response into a report. `None` when no
/// balanced JSON block exists or it does not deserialize — the chain treats
/// that as a provider failure.
pub fn parse_provider_response(text: &str) -> Option<AnalysisReport> {
    let block = extract_json_block(text)?;
    serde_json::from_str::<AnalysisReport>(block).ok()
}
