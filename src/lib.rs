// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod analyze;
pub mod config;
pub mod error;
pub mod feed;
pub mod scoring;
pub mod signals;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::EscalationChain;
pub use crate::config::SectorConfig;
pub use crate::feed::types::AnalysisType;
pub use crate::feed::{CycleSummary, Pipeline};
pub use crate::scoring::{ScoreBreakdown, Tier};
pub use crate::store::{MemoryStore, Opportunity, OpportunityStore};
