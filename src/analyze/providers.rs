// src/analyze/providers.rs
//! Provider adapters for the escalation chain.
//!
//! Each adapter is an explicit object built once from configuration — no
//! module-level singletons. They share one shape: send the prompt, return
//! the raw response text, let the chain do timeout bounding and JSON
//! extraction.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One step of the escalation chain.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Perform one remote call. The chain wraps this in its own timeout.
    async fn invoke(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &str;
    /// Per-provider budget; deeper models get longer.
    fn timeout(&self) -> Duration;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("placsp-opportunity-analyzer/0.1")
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building provider http client")
}

// ------------------------------------------------------------
// OpenAI (chat completions)
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("OPENAI_API_KEY is not set");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("openai returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("openai response body")?;
        match body.choices.into_iter().next() {
            Some(c) => Ok(c.message.content),
            None => bail!("openai response carried no choices"),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

// ------------------------------------------------------------
// Claude (Anthropic messages)
// ------------------------------------------------------------

pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl AnalysisProvider for ClaudeProvider {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("CLAUDE_API_KEY is not set");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(default)]
            text: String,
        }

        let req = Req {
            model: &self.model,
            max_tokens: 2048,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&req)
            .send()
            .await
            .context("claude request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("claude returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("claude response body")?;
        let text: String = body.content.into_iter().map(|b| b.text).collect();
        if text.is_empty() {
            bail!("claude response carried no text blocks");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
