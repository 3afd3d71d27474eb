// End-to-end ingestion cycles against a fixture feed, using the shipped
// `ingenieria` sector configuration.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use placsp_opportunity_analyzer::error::TransportError;
use placsp_opportunity_analyzer::feed::retriever::FeedFetcher;
use placsp_opportunity_analyzer::store::{MemoryStore, OpportunityStore, ReviewState};
use placsp_opportunity_analyzer::{AnalysisType, Pipeline, SectorConfig, Tier};

const FIXTURE: &[u8] = include_bytes!("fixtures/placsp_atom.xml");

struct FixtureFetcher;

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
        Ok(FIXTURE.to_vec())
    }
}

struct FailingFetcher;

#[async_trait]
impl FeedFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::FORBIDDEN,
        })
    }
}

struct GarbageFetcher;

#[async_trait]
impl FeedFetcher for GarbageFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
        Ok(b"<feed><entry><id>x</entry>".to_vec())
    }
}

fn sector() -> SectorConfig {
    SectorConfig::from_path(Path::new("config/sectors/ingenieria.toml")).unwrap()
}

fn pipeline(fetcher: Box<dyn FeedFetcher>) -> (Pipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        sector(),
        fetcher,
        Arc::clone(&store) as Arc<dyn OpportunityStore>,
    )
    .unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn tender_cycle_scores_filters_and_persists() {
    let (pipeline, store) = pipeline(Box::new(FixtureFetcher));
    let summary = pipeline.run_cycle(AnalysisType::Tender).await;

    // Five <entry> elements: four well-formed, one without an identifier.
    assert_eq!(summary.parsed, 4);
    assert_eq!(summary.skipped_entries, 1);
    // Three PUB entries; the ADJ award is out of scope for this cycle.
    assert_eq!(summary.matched_status, 3);
    assert_eq!(summary.scored, 3);
    // The office-supplies tender scores 10 and is dropped.
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.tiers.low, 2);
    assert_eq!(summary.tiers.top + summary.tiers.mid + summary.tiers.reject, 0);
    assert!(summary.transport_error.is_none());
    assert!(summary.parse_error.is_none());

    // Direct CPV override, no keyword hits, 75k against a 200k optimum.
    let road = store.get("EXP-2025-0144").unwrap();
    assert_eq!(road.score.cpv, 100);
    assert_eq!(road.score.keywords, 0);
    assert_eq!(road.score.amount, 62);
    assert_eq!(road.score.urgency, 50);
    assert_eq!(road.score.total, 51);
    assert_eq!(road.score.tier, Tier::Low);
    assert_eq!(road.signals.cpv.category.as_deref(), Some("direct"));
    assert_eq!(road.contracting_body, "Ayuntamiento de Zaragoza");
    assert_eq!(road.detail_url, "https://contrataciondelestado.es/detalle?idDoc=EXP-2025-0144");
    assert_eq!(road.document_url, "https://contrataciondelestado.es/docs/EXP-2025-0144.pdf");
    assert_eq!(road.review_state, ReviewState::New);
    assert!(road.analysis.is_none());

    // Category CPV, keyword hits in title + CPV description, far deadline.
    let survey = store.get("EXP-2025-0151").unwrap();
    assert_eq!(survey.score.cpv, 90);
    assert_eq!(survey.score.keywords, 35);
    assert_eq!(survey.score.amount, 95);
    assert_eq!(survey.score.urgency, 40);
    assert_eq!(survey.score.total, 64);
    assert_eq!(survey.signals.cpv.category.as_deref(), Some("topografia"));
    assert_eq!(survey.signals.keywords.category.as_deref(), Some("core"));
    assert!(survey
        .signals
        .keywords
        .matches
        .iter()
        .any(|m| m == "cartograf\u{ed}a"));
    assert_eq!(survey.cpv_description, "Servicios de topograf\u{ed}a");
    assert!(survey.deadline.is_some());

    // Rejected entries never reach the store.
    assert!(store.get("EXP-2025-0200").is_none());
    assert_eq!(store.all().len(), 2);
}

#[tokio::test]
async fn award_cycle_captures_the_winner() {
    let (pipeline, store) = pipeline(Box::new(FixtureFetcher));
    let summary = pipeline.run_cycle(AnalysisType::Award).await;

    assert_eq!(summary.matched_status, 1);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.tiers.low, 1);

    let award = store.get("EXP-2025-0098").unwrap();
    assert_eq!(award.analysis_type, AnalysisType::Award);
    assert_eq!(award.status_code, "ADJ");
    assert_eq!(award.score.total, 55);
    let winner = award.winner.unwrap();
    assert_eq!(winner.name, "Construcciones del Ebro SL");
    assert_eq!(winner.tax_id.as_deref(), Some("B50123456"));
}

#[tokio::test]
async fn reingesting_the_same_feed_is_idempotent() {
    let (pipeline, store) = pipeline(Box::new(FixtureFetcher));

    pipeline.run_cycle(AnalysisType::Tender).await;
    let before = store.get("EXP-2025-0144").unwrap();

    let second = pipeline.run_cycle(AnalysisType::Tender).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);

    // Nothing changed, so the record (including `last_updated`) is identical.
    let after = store.get("EXP-2025-0144").unwrap();
    assert_eq!(before, after);
    assert_eq!(before.first_seen, after.first_seen);
    assert_eq!(store.all().len(), 2);
}

#[tokio::test]
async fn transport_failure_aborts_the_cycle_with_a_summary() {
    let (pipeline, store) = pipeline(Box::new(FailingFetcher));
    let summary = pipeline.run_cycle(AnalysisType::Tender).await;

    assert_eq!(summary.parsed, 0);
    assert_eq!(summary.created, 0);
    let err = summary.transport_error.unwrap();
    assert!(err.contains("403"), "got: {err}");
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn malformed_document_aborts_the_cycle_with_a_summary() {
    let (pipeline, store) = pipeline(Box::new(GarbageFetcher));
    let summary = pipeline.run_cycle(AnalysisType::Tender).await;

    assert_eq!(summary.parsed, 0);
    assert!(summary.parse_error.is_some());
    assert!(summary.transport_error.is_none());
    assert!(store.all().is_empty());
}
