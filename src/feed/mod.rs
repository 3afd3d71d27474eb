// src/feed/mod.rs
//! The ingestion pipeline: fetch → parse → status filter → signals →
//! scoring → persistence, run once per (sector, analysis type).
//!
//! Single-threaded and sequential within one cycle. A fault on one entry is
//! counted and logged without stopping the remainder; transport and parse
//! failures abort only the current cycle and surface in the summary, never
//! as an unhandled error. Dropping the returned future cancels cooperatively
//! at the next await/entry boundary.

pub mod parser;
pub mod retriever;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SectorConfig;
use crate::error::FeedError;
use crate::feed::retriever::FeedFetcher;
use crate::feed::types::{filter_by_status, AnalysisType, FeedEntry};
use crate::scoring::{ScoringEngine, Tier};
use crate::signals::cpv::CpvMatcher;
use crate::signals::keywords::KeywordMatcher;
use crate::store::{OpportunitySignals, OpportunityStore, ScoredEntry};

/// One-time metrics registration. No exporter is mounted here; recorders
/// are the host's concern.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_entries_total", "Entries parsed from the feed.");
        describe_counter!(
            "feed_entries_skipped_total",
            "Malformed entries skipped during parsing."
        );
        describe_counter!(
            "feed_cycle_errors_total",
            "Cycles aborted by transport or parse failures."
        );
        describe_counter!(
            "opportunities_created_total",
            "Opportunities inserted on first sighting."
        );
        describe_counter!(
            "opportunities_updated_total",
            "Opportunities merged on re-sighting."
        );
        describe_counter!(
            "opportunities_rejected_total",
            "Entries dropped below the discard threshold."
        );
        describe_gauge!("feed_cycle_last_run_ts", "Unix ts of the last cycle.");
    });
}

/// Persisted-tier counts for one cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TierCounts {
    pub top: usize,
    pub mid: usize,
    pub low: usize,
    pub reject: usize,
}

impl TierCounts {
    fn bump(&mut self, tier: Tier) {
        match tier {
            Tier::Top => self.top += 1,
            Tier::Mid => self.mid += 1,
            Tier::Low => self.low += 1,
            Tier::Reject => self.reject += 1,
        }
    }
}

/// Structured result of one cycle, returned even under partial failure.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub sector: String,
    pub analysis_type: AnalysisType,
    /// Entries parsed out of the document.
    pub parsed: usize,
    /// Malformed entries skipped during parsing.
    pub skipped_entries: usize,
    /// Entries remaining after the status filter.
    pub matched_status: usize,
    /// Entries scored (all of `matched_status`).
    pub scored: usize,
    /// Intentional drops below the discard threshold — not failures.
    pub rejected: usize,
    pub created: usize,
    pub updated: usize,
    pub tiers: TierCounts,
    pub transport_error: Option<String>,
    pub parse_error: Option<String>,
}

impl CycleSummary {
    fn empty(sector: &str, analysis_type: AnalysisType) -> Self {
        Self {
            sector: sector.to_string(),
            analysis_type,
            parsed: 0,
            skipped_entries: 0,
            matched_status: 0,
            scored: 0,
            rejected: 0,
            created: 0,
            updated: 0,
            tiers: TierCounts::default(),
            transport_error: None,
            parse_error: None,
        }
    }
}

pub struct Pipeline {
    sector: SectorConfig,
    fetcher: Box<dyn FeedFetcher>,
    store: Arc<dyn OpportunityStore>,
    cpv: CpvMatcher,
    keywords: KeywordMatcher,
    scoring: ScoringEngine,
}

impl Pipeline {
    /// Compile matchers once; cycles after that are allocation-light.
    pub fn new(
        sector: SectorConfig,
        fetcher: Box<dyn FeedFetcher>,
        store: Arc<dyn OpportunityStore>,
    ) -> Result<Self> {
        let cpv = CpvMatcher::new(sector.cpv.categories.clone(), sector.cpv.direct.clone());
        let keywords = KeywordMatcher::new(sector.keywords.tiers.clone())?;
        let scoring = ScoringEngine::new(
            sector.scoring.weights,
            sector.scoring.thresholds,
            sector.scoring.optimal_amount,
        );
        Ok(Self {
            sector,
            fetcher,
            store,
            cpv,
            keywords,
            scoring,
        })
    }

    pub fn sector_name(&self) -> &str {
        &self.sector.sector.name
    }

    /// Score one entry. Pure: no store access, no I/O.
    fn score_entry(&self, analysis_type: AnalysisType, entry: FeedEntry) -> ScoredEntry {
        let cpv_signal = self.cpv.score(&entry.cpv_code);
        let keyword_signal =
            self.keywords
                .score(&entry.title, &entry.description, &entry.cpv_description);
        let days_until_deadline = entry
            .deadline
            .map(|d| (d - Utc::now().date_naive()).num_days());
        let score = self.scoring.compute(
            cpv_signal.score,
            keyword_signal.score,
            entry.amount,
            days_until_deadline,
        );

        ScoredEntry {
            sector: self.sector.sector.name.clone(),
            analysis_type,
            entry,
            score,
            signals: OpportunitySignals {
                cpv: cpv_signal,
                keywords: keyword_signal,
            },
        }
    }

    /// Run one full cycle for `analysis_type`.
    pub async fn run_cycle(&self, analysis_type: AnalysisType) -> CycleSummary {
        ensure_metrics_described();
        let mut summary = CycleSummary::empty(&self.sector.sector.name, analysis_type);

        let Some(url) = self.sector.feed_url(analysis_type) else {
            debug!(
                sector = %summary.sector,
                analysis_type = analysis_type.as_str(),
                "no feed configured, skipping cycle"
            );
            return summary;
        };

        let raw = match self.fetcher.fetch(url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    sector = %summary.sector,
                    url,
                    cert_path = ?self.fetcher.credentials_hint(),
                    certificate_issue = e.is_certificate_issue(),
                    error = %e,
                    "feed retrieval failed, aborting cycle"
                );
                counter!("feed_cycle_errors_total").increment(1);
                summary.transport_error = Some(e.to_string());
                return summary;
            }
        };

        let outcome = match parser::parse(&raw) {
            Ok(outcome) => outcome,
            Err(FeedError::Parse(reason)) => {
                warn!(sector = %summary.sector, url, reason, "malformed feed document");
                counter!("feed_cycle_errors_total").increment(1);
                summary.parse_error = Some(reason);
                return summary;
            }
            Err(FeedError::Transport(e)) => {
                // Parser never produces this; keep the summary honest anyway.
                summary.transport_error = Some(e.to_string());
                return summary;
            }
        };

        summary.parsed = outcome.entries.len();
        summary.skipped_entries = outcome.skipped;
        counter!("feed_entries_total").increment(summary.parsed as u64);
        counter!("feed_entries_skipped_total").increment(summary.skipped_entries as u64);

        let entries = filter_by_status(outcome.entries, analysis_type);
        summary.matched_status = entries.len();

        let discard_below = self.sector.scoring.discard_below;
        for entry in entries {
            let scored = self.score_entry(analysis_type, entry);
            summary.scored += 1;

            if scored.score.total < discard_below {
                summary.rejected += 1;
                counter!("opportunities_rejected_total").increment(1);
                debug!(
                    business_key = %scored.entry.business_key,
                    total = scored.score.total,
                    "below discard threshold, dropped"
                );
                continue;
            }

            summary.tiers.bump(scored.score.tier);
            let outcome = self.store.upsert(scored);
            if outcome.created {
                summary.created += 1;
                counter!("opportunities_created_total").increment(1);
            } else {
                summary.updated += 1;
                counter!("opportunities_updated_total").increment(1);
            }
        }

        gauge!("feed_cycle_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            sector = %summary.sector,
            analysis_type = analysis_type.as_str(),
            parsed = summary.parsed,
            skipped = summary.skipped_entries,
            matched_status = summary.matched_status,
            rejected = summary.rejected,
            created = summary.created,
            updated = summary.updated,
            "feed cycle finished"
        );
        summary
    }
}
