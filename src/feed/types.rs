// src/feed/types.rs
//! Transient records produced by the parser, plus the fixed status-code
//! mapping and the status filter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which half of the procurement lifecycle a cycle looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Tender,
    Award,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Tender => "tender",
            AnalysisType::Award => "award",
        }
    }

    /// Fixed lookup table mapping PLACSP `ContractFolderStatusCode` values to
    /// a logical analysis type. `PUB`/`EV` are open tenders (published, under
    /// evaluation); `ADJ`/`RES` are awarded/resolved folders. Anything else
    /// (`ANUL`, `PRE`, ...) belongs to neither set and is dropped by
    /// [`filter_by_status`].
    pub fn status_codes(&self) -> &'static [&'static str] {
        match self {
            AnalysisType::Tender => &["PUB", "EV"],
            AnalysisType::Award => &["ADJ", "RES"],
        }
    }
}

/// Winning party attached to award entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub name: String,
    /// NIF/CIF of the winning party, when the feed carries it.
    pub tax_id: Option<String>,
}

/// One normalized feed entry. Created per parse cycle, scored, then
/// discarded; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Unique external identifier correlating this entry to a stored
    /// opportunity (the `idDoc` of the PLACSP detail URL).
    pub business_key: String,
    pub title: String,
    pub description: String,
    pub cpv_code: String,
    pub cpv_description: String,
    pub amount: Option<f64>,
    pub contracting_body: String,
    pub status_code: String,
    pub deadline: Option<NaiveDate>,
    pub detail_url: String,
    pub document_url: String,
    pub winner: Option<Winner>,
}

/// Retain only entries whose status code belongs to `wanted`'s set.
/// Unmapped codes are dropped silently; an empty result is valid.
pub fn filter_by_status(entries: Vec<FeedEntry>, wanted: AnalysisType) -> Vec<FeedEntry> {
    let codes = wanted.status_codes();
    entries
        .into_iter()
        .filter(|e| codes.contains(&e.status_code.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: &str) -> FeedEntry {
        FeedEntry {
            business_key: "K".into(),
            title: String::new(),
            description: String::new(),
            cpv_code: String::new(),
            cpv_description: String::new(),
            amount: None,
            contracting_body: String::new(),
            status_code: status.into(),
            deadline: None,
            detail_url: String::new(),
            document_url: String::new(),
            winner: None,
        }
    }

    #[test]
    fn filter_keeps_only_mapped_codes() {
        let entries = vec![entry("PUB"), entry("ADJ"), entry("ANUL"), entry("EV")];
        let tenders = filter_by_status(entries.clone(), AnalysisType::Tender);
        assert_eq!(tenders.len(), 2);
        assert!(tenders.iter().all(|e| e.status_code != "ADJ"));

        let awards = filter_by_status(entries, AnalysisType::Award);
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].status_code, "ADJ");
    }

    #[test]
    fn empty_result_is_valid() {
        let out = filter_by_status(vec![entry("ANUL")], AnalysisType::Tender);
        assert!(out.is_empty());
    }
}
