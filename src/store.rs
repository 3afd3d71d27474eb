// src/store.rs
//! Persistence gate for scored opportunities.
//!
//! One record per business key. The upsert is a single critical section
//! (find-or-create-or-update under one lock), never a read-then-write pair,
//! so concurrent cycles racing on the same key cannot lose updates.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::schema::AnalysisReport;
use crate::feed::types::{AnalysisType, FeedEntry, Winner};
use crate::scoring::ScoreBreakdown;
use crate::signals::SignalResult;

/// Review lifecycle owned by the sales side; the pipeline never moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    New,
    Reviewed,
    Discarded,
}

/// Signal evidence kept alongside the breakdown for explainability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySignals {
    pub cpv: SignalResult,
    pub keywords: SignalResult,
}

/// A scored entry on its way into the store, before `first_seen` and
/// `review_state` exist.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub sector: String,
    pub analysis_type: AnalysisType,
    pub entry: FeedEntry,
    pub score: ScoreBreakdown,
    pub signals: OpportunitySignals,
}

/// The persisted record, unique per business key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub business_key: String,
    pub analysis_type: AnalysisType,
    pub sector: String,
    pub title: String,
    pub description: String,
    pub cpv_code: String,
    pub cpv_description: String,
    pub amount: Option<f64>,
    pub contracting_body: String,
    pub status_code: String,
    pub deadline: Option<chrono::NaiveDate>,
    pub detail_url: String,
    pub document_url: String,
    pub winner: Option<Winner>,
    pub score: ScoreBreakdown,
    pub signals: OpportunitySignals,
    pub analysis: Option<AnalysisReport>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub review_state: ReviewState,
}

impl Opportunity {
    fn from_scored(s: ScoredEntry, now: DateTime<Utc>) -> Self {
        let e = s.entry;
        Self {
            business_key: e.business_key,
            analysis_type: s.analysis_type,
            sector: s.sector,
            title: e.title,
            description: e.description,
            cpv_code: e.cpv_code,
            cpv_description: e.cpv_description,
            amount: e.amount,
            contracting_body: e.contracting_body,
            status_code: e.status_code,
            deadline: e.deadline,
            detail_url: e.detail_url,
            document_url: e.document_url,
            winner: e.winner,
            score: s.score,
            signals: s.signals,
            analysis: None,
            first_seen: now,
            last_updated: now,
            review_state: ReviewState::New,
        }
    }

    /// Merge mutable fields from a re-sighting. `first_seen`, `review_state`
    /// and any attached analysis stay untouched. Returns whether anything
    /// actually changed, so an identical re-ingest leaves the record
    /// byte-identical.
    fn merge_from(&mut self, s: ScoredEntry) -> bool {
        let e = s.entry;
        let mut changed = false;

        macro_rules! merge {
            ($field:ident, $value:expr) => {
                let v = $value;
                if self.$field != v {
                    self.$field = v;
                    changed = true;
                }
            };
        }

        merge!(title, e.title);
        merge!(description, e.description);
        merge!(cpv_code, e.cpv_code);
        merge!(cpv_description, e.cpv_description);
        merge!(amount, e.amount);
        merge!(contracting_body, e.contracting_body);
        merge!(status_code, e.status_code);
        merge!(deadline, e.deadline);
        merge!(detail_url, e.detail_url);
        merge!(document_url, e.document_url);
        merge!(winner, e.winner);
        merge!(score, s.score);
        merge!(signals, s.signals);

        changed
    }
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub created: bool,
    pub stored: Opportunity,
}

/// Storage seam. The in-memory implementation below is the reference; a
/// database-backed one must keep `upsert` atomic per key.
pub trait OpportunityStore: Send + Sync {
    fn upsert(&self, scored: ScoredEntry) -> UpsertOutcome;
    fn get(&self, business_key: &str) -> Option<Opportunity>;
    /// Attach (or replace) the analysis subdocument. Returns false when the
    /// key is unknown.
    fn attach_analysis(&self, business_key: &str, report: AnalysisReport) -> bool;
    fn all(&self) -> Vec<Opportunity>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Opportunity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OpportunityStore for MemoryStore {
    fn upsert(&self, scored: ScoredEntry) -> UpsertOutcome {
        let key = scored.entry.business_key.clone();
        let now = Utc::now();
        let mut map = self.inner.lock().expect("store mutex poisoned");

        match map.entry(key) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                let stored = slot.insert(Opportunity::from_scored(scored, now)).clone();
                UpsertOutcome {
                    created: true,
                    stored,
                }
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if record.merge_from(scored) {
                    record.last_updated = now;
                }
                UpsertOutcome {
                    created: false,
                    stored: record.clone(),
                }
            }
        }
    }

    fn get(&self, business_key: &str) -> Option<Opportunity> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .get(business_key)
            .cloned()
    }

    fn attach_analysis(&self, business_key: &str, report: AnalysisReport) -> bool {
        let mut map = self.inner.lock().expect("store mutex poisoned");
        match map.get_mut(business_key) {
            Some(record) => {
                record.analysis = Some(report);
                record.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    fn all(&self) -> Vec<Opportunity> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}
