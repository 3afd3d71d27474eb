// src/analyze/mod.rs
//! Analysis escalation chain.
//!
//! Providers are attempted strictly in configured (cost-ascending) order,
//! each bounded by its own timeout. Any failure — timeout, transport error,
//! missing or unparsable JSON — logs, records an attempt and advances. When
//! every provider is exhausted the deterministic fallback answers, so the
//! call as a whole never errors and worst-case latency is the sum of the
//! configured timeouts.

pub mod fallback;
pub mod providers;
pub mod schema;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::analyze::providers::{AnalysisProvider, ClaudeProvider, OpenAiProvider};
use crate::analyze::schema::AnalysisReport;

/// What happened to one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error(String),
    /// Provider answered, but without a parsable JSON block.
    InvalidResponse,
}

/// Ephemeral record of one attempt, for the cycle log.
#[derive(Debug, Clone)]
pub struct AnalysisAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

// ------------------------------------------------------------
// Configuration
// ------------------------------------------------------------

fn default_timeout_secs() -> u64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// "openai" | "claude"
    pub kind: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `config/analysis.toml`: the ordered provider list.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading analysis config at {}", path.display()))?;
        toml::from_str(&content).context("parsing analysis config")
    }
}

// ------------------------------------------------------------
// Chain
// ------------------------------------------------------------

pub struct EscalationChain {
    providers: Vec<Box<dyn AnalysisProvider>>,
}

impl EscalationChain {
    pub fn new(providers: Vec<Box<dyn AnalysisProvider>>) -> Self {
        Self { providers }
    }

    /// Build provider adapters from config; API keys come from the
    /// environment (`OPENAI_API_KEY` / `CLAUDE_API_KEY`).
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let mut providers: Vec<Box<dyn AnalysisProvider>> = Vec::new();
        for p in &config.providers {
            let timeout = Duration::from_secs(p.timeout_secs);
            match p.kind.as_str() {
                "openai" => {
                    let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
                    providers.push(Box::new(OpenAiProvider::new(key, p.model.clone(), timeout)?));
                }
                "claude" => {
                    let key = std::env::var("CLAUDE_API_KEY").unwrap_or_default();
                    providers.push(Box::new(ClaudeProvider::new(key, p.model.clone(), timeout)?));
                }
                other => bail!("unsupported analysis provider kind: {other}"),
            }
        }
        Ok(Self::new(providers))
    }

    /// Run the cascade over one opportunity's source document. Never errors:
    /// the deterministic fallback answers when all providers fail.
    pub async fn analyze(
        &self,
        title: &str,
        document: &str,
    ) -> (AnalysisReport, Vec<AnalysisAttempt>) {
        let prompt = build_prompt(title, document);
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name().to_string();
            let started = Instant::now();
            let outcome = tokio::time::timeout(provider.timeout(), provider.invoke(&prompt)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            metrics::counter!("analysis_attempts_total").increment(1);

            match outcome {
                Ok(Ok(text)) => match schema::parse_provider_response(&text) {
                    Some(mut report) => {
                        report.provider_used = name.clone();
                        attempts.push(AnalysisAttempt {
                            provider: name.clone(),
                            outcome: AttemptOutcome::Success,
                            elapsed_ms,
                        });
                        info!(provider = %name, elapsed_ms, "analysis provider succeeded");
                        return (report, attempts);
                    }
                    None => {
                        warn!(provider = %name, elapsed_ms, "provider response carried no parsable JSON");
                        attempts.push(AnalysisAttempt {
                            provider: name,
                            outcome: AttemptOutcome::InvalidResponse,
                            elapsed_ms,
                        });
                    }
                },
                Ok(Err(e)) => {
                    warn!(provider = %name, elapsed_ms, error = %e, "analysis provider failed");
                    attempts.push(AnalysisAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Error(e.to_string()),
                        elapsed_ms,
                    });
                }
                Err(_) => {
                    warn!(provider = %name, elapsed_ms, "analysis provider timed out");
                    attempts.push(AnalysisAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Timeout,
                        elapsed_ms,
                    });
                }
            }
        }

        metrics::counter!("analysis_fallback_total").increment(1);
        info!("all providers exhausted, using deterministic fallback");
        let report = fallback::analyze(&format!("{title}\n{document}"));
        (report, attempts)
    }
}

/// Prompt shared by every provider attempt. Asks for the fixed output
/// contract as a JSON object embedded in the reply.
fn build_prompt(title: &str, document: &str) -> String {
    format!(
        "Analiza la siguiente licitaci\u{f3}n p\u{fa}blica espa\u{f1}ola y responde \
         \u{da}NICAMENTE con un objeto JSON con estas claves: \
         score (0-100), tier (top|mid|low|reject), detected_components (lista), \
         pain_points (lista), contact_leads (lista), outreach_text (texto breve de contacto), \
         confidence (0-1).\n\nT\u{cd}TULO: {title}\n\nDOCUMENTO:\n{document}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted provider used across the chain tests.
    struct Scripted {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
        timeout: Duration,
    }

    enum Behavior {
        Good,
        BadJson,
        Fail,
        Hang,
    }

    #[async_trait]
    impl AnalysisProvider for Scripted {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Good => Ok(
                    "Claro, aqu\u{ed} va: {\"score\": 88, \"tier\": \"top\", \"confidence\": 0.9}"
                        .to_string(),
                ),
                Behavior::BadJson => Ok("no json at all".to_string()),
                Behavior::Fail => bail!("boom"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }
    }

    fn scripted(
        name: &'static str,
        behavior: Behavior,
    ) -> (Box<dyn AnalysisProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Scripted {
                name,
                behavior,
                calls: Arc::clone(&calls),
                timeout: Duration::from_millis(100),
            }),
            calls,
        )
    }

    #[tokio::test]
    async fn timeout_escalates_to_next_provider_and_stops_there() {
        let (p1, _c1) = scripted("p1", Behavior::Hang);
        let (p2, _c2) = scripted("p2", Behavior::Good);
        let (p3, c3) = scripted("p3", Behavior::Good);

        let chain = EscalationChain::new(vec![p1, p2, p3]);
        let (report, attempts) = chain.analyze("t", "doc").await;

        assert_eq!(report.provider_used, "p2");
        assert_eq!(report.score, 88.0);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].outcome, AttemptOutcome::Timeout);
        assert_eq!(attempts[1].outcome, AttemptOutcome::Success);
        assert_eq!(c3.load(Ordering::SeqCst), 0, "p3 must never be attempted");
    }

    #[tokio::test]
    async fn unparsable_response_counts_as_provider_failure() {
        let (p1, _) = scripted("p1", Behavior::BadJson);
        let (p2, _) = scripted("p2", Behavior::Good);

        let chain = EscalationChain::new(vec![p1, p2]);
        let (report, attempts) = chain.analyze("t", "doc").await;

        assert_eq!(report.provider_used, "p2");
        assert_eq!(attempts[0].outcome, AttemptOutcome::InvalidResponse);
    }

    #[tokio::test]
    async fn all_failures_fall_back_to_basico() {
        let (p1, _) = scripted("p1", Behavior::Fail);
        let (p2, _) = scripted("p2", Behavior::Hang);

        let chain = EscalationChain::new(vec![p1, p2]);
        let started = Instant::now();
        let (report, attempts) = chain
            .analyze("Levantamiento topografico", "con dron y lidar")
            .await;

        assert_eq!(report.provider_used, "basico");
        assert!((report.confidence - 0.5).abs() < f32::EPSILON);
        assert!(!report.detected_components.is_empty());
        assert_eq!(attempts.len(), 2);
        // Bounded by the sum of configured timeouts (plus scheduling slack).
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_fallback() {
        let chain = EscalationChain::new(Vec::new());
        let (report, attempts) = chain.analyze("t", "d").await;
        assert_eq!(report.provider_used, "basico");
        assert!(attempts.is_empty());
    }
}
