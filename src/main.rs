// src/main.rs
//! Binary entrypoint: load sector configs, run one ingestion cycle per
//! (sector, type), then escalate top-tier opportunities through the
//! analysis chain. Scheduling is left to the host (cron/systemd timer).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use placsp_opportunity_analyzer::analyze::{AnalysisConfig, EscalationChain};
use placsp_opportunity_analyzer::config::load_sector_dir;
use placsp_opportunity_analyzer::feed::retriever::FeedRetriever;
use placsp_opportunity_analyzer::scoring::Tier;
use placsp_opportunity_analyzer::store::{MemoryStore, OpportunityStore};
use placsp_opportunity_analyzer::{AnalysisType, Pipeline};

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cert_path = env_path("FEED_CERT_PATH", "certs/client_cert.pem");
    let key_path = env_path("FEED_KEY_PATH", "certs/client_key.pem");
    let sectors_dir = env_path("SECTOR_CONFIG_DIR", "config/sectors");
    let analysis_path = env_path("ANALYSIS_CONFIG_PATH", "config/analysis.toml");

    let sectors = load_sector_dir(&sectors_dir)?;
    info!(count = sectors.len(), dir = %sectors_dir.display(), "sector configs loaded");

    let store: Arc<dyn OpportunityStore> = Arc::new(MemoryStore::new());

    for sector in sectors {
        let retriever = FeedRetriever::new(&cert_path, &key_path)
            .with_context(|| format!("building retriever for sector {}", sector.sector.name))?;
        let pipeline = Pipeline::new(sector, Box::new(retriever), Arc::clone(&store))?;

        for analysis_type in [AnalysisType::Tender, AnalysisType::Award] {
            let summary = pipeline.run_cycle(analysis_type).await;
            match serde_json::to_string(&summary) {
                Ok(json) => info!(summary = %json, "cycle summary"),
                Err(_) => info!(?summary, "cycle summary"),
            }
        }
    }

    // Deep analysis for the opportunities worth a salesperson's time.
    let analysis = AnalysisConfig::from_path(&analysis_path)
        .with_context(|| format!("loading {}", analysis_path.display()))?;
    let chain = EscalationChain::from_config(&analysis)?;

    for opp in store.all() {
        if opp.score.tier != Tier::Top || opp.analysis.is_some() {
            continue;
        }
        let (report, attempts) = chain.analyze(&opp.title, &opp.description).await;
        info!(
            business_key = %opp.business_key,
            provider = %report.provider_used,
            attempts = attempts.len(),
            "analysis complete"
        );
        if !store.attach_analysis(&opp.business_key, report) {
            warn!(business_key = %opp.business_key, "opportunity vanished before analysis attach");
        }
    }

    Ok(())
}
