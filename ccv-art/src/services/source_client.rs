//! LLM source clients for fact queries
//!
//! Each client asks one external model the popular/timeless question for a
//! key and returns a `SourceOutcome`. A single network attempt per call, no
//! internal retries; transport, status, and parse failures are captured in
//! the outcome and never raised to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{ArtKey, QueryKind, SourceOutcome};

pub(crate) const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub(crate) const PERPLEXITY_CHAT_URL: &str = "https://api.perplexity.ai/chat/completions";
pub(crate) const XAI_CHAT_URL: &str = "https://api.x.ai/v1/chat/completions";

const SOURCE_TIMEOUT_SECS: u64 = 30;
const MAX_NAME_LEN: usize = 200;
const MAX_RATIONALE_LEN: usize = 500;

const SYSTEM_PROMPT: &str = "You are a concise art history expert. Give brief, factual answers.";

/// Source client errors (internal; surfaced only inside a SourceOutcome)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One independent information source
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Source identifier used in outcomes and prompts
    fn name(&self) -> &'static str;

    /// Query one sub-query for a key. Infallible by contract: failures come
    /// back as an unsuccessful outcome.
    async fn query(&self, kind: QueryKind, key: &ArtKey) -> SourceOutcome;
}

/// Build the "most popular" question for a key
pub fn build_popular_prompt(key: &ArtKey) -> String {
    format!(
        "What was the single most popular/famous {} work from {} in the {}?\n\
         Give me just the name of the work and artist, plus one brief sentence why it was popular.\n\
         Be concise. Format: \"Work Name\" by Artist - brief reason",
        key.art_form.to_lowercase(),
        key.region,
        key.decade_label(),
    )
}

/// Build the "most timeless" question for a key
pub fn build_timeless_prompt(key: &ArtKey) -> String {
    format!(
        "What is the most timeless/enduring {} work from {} created in the {}?\n\
         Something that's still celebrated and influential today.\n\
         Give me just the name of the work and artist, plus one brief sentence on its lasting impact.\n\
         Be concise. Format: \"Work Name\" by Artist - brief reason",
        key.art_form.to_lowercase(),
        key.region,
        key.decade_label(),
    )
}

/// Parse a raw source answer into a structured outcome.
///
/// The work name is the first quoted substring if present, otherwise the
/// first line; the rationale is the remainder. Both are capped to bound
/// storage and downstream prompt size.
pub(crate) fn parse_source_text(text: &str, source: &'static str, kind: QueryKind) -> SourceOutcome {
    let text = text.trim();

    // Prefer a quoted work name
    if let Some(open) = text.find('"') {
        if let Some(len) = text[open + 1..].find('"') {
            let name = &text[open + 1..open + 1 + len];
            if !name.is_empty() {
                let mut rest = String::with_capacity(text.len());
                rest.push_str(&text[..open]);
                rest.push_str(&text[open + len + 2..]);
                let rationale = rest
                    .trim()
                    .trim_start_matches([' ', '-', '–', '—', ':'])
                    .trim()
                    .to_string();
                return SourceOutcome::ok(
                    source,
                    kind,
                    truncate(name, MAX_NAME_LEN),
                    truncate(&rationale, MAX_RATIONALE_LEN),
                );
            }
        }
    }

    // Fallback: first line as name, remainder as rationale
    let mut lines = text.lines();
    let name = lines.next().unwrap_or("").trim();
    let rationale = lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    SourceOutcome::ok(
        source,
        kind,
        truncate(name, MAX_NAME_LEN),
        truncate(&rationale, MAX_RATIONALE_LEN),
    )
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ============================================================================
// OpenAI-compatible chat plumbing (shared by all three sources, and by the
// Perplexity-backed enrichment clients)
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// One OpenAI-compatible chat completions endpoint
pub(crate) struct ChatEndpoint {
    url: String,
    api_key: String,
    model: &'static str,
    http: reqwest::Client,
}

impl ChatEndpoint {
    pub(crate) fn new(
        url: impl Into<String>,
        api_key: String,
        model: &'static str,
    ) -> Result<Self, SourceError> {
        Self::with_timeout(url, api_key, model, SOURCE_TIMEOUT_SECS)
    }

    pub(crate) fn with_timeout(
        url: impl Into<String>,
        api_key: String,
        model: &'static str,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            api_key,
            model,
            http,
        })
    }

    /// One completion call. Returns the assistant text or a typed failure.
    pub(crate) async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, SourceError> {
        let request = ChatRequest {
            model: self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), detail));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SourceError::Parse("empty completion".to_string()))
    }
}

async fn query_endpoint(
    endpoint: &ChatEndpoint,
    source: &'static str,
    kind: QueryKind,
    key: &ArtKey,
) -> SourceOutcome {
    let prompt = match kind {
        QueryKind::Popular => build_popular_prompt(key),
        QueryKind::Timeless => build_timeless_prompt(key),
    };

    match endpoint.complete(SYSTEM_PROMPT, &prompt, 150, 0.3).await {
        Ok(text) => parse_source_text(&text, source, kind),
        Err(e) => {
            debug!(source, kind = %kind, error = %e, "Source query failed");
            SourceOutcome::failed(source, kind, e.to_string())
        }
    }
}

/// OpenAI GPT source
pub struct OpenAiSource {
    endpoint: ChatEndpoint,
}

impl OpenAiSource {
    pub fn new(api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::new(OPENAI_CHAT_URL, api_key, "gpt-4o-mini")?,
        })
    }
}

#[async_trait]
impl SourceClient for OpenAiSource {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn query(&self, kind: QueryKind, key: &ArtKey) -> SourceOutcome {
        query_endpoint(&self.endpoint, self.name(), kind, key).await
    }
}

/// Perplexity source (OpenAI-compatible API)
pub struct PerplexitySource {
    endpoint: ChatEndpoint,
}

impl PerplexitySource {
    pub fn new(api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::new(
                PERPLEXITY_CHAT_URL,
                api_key,
                "llama-3.1-sonar-small-128k-online",
            )?,
        })
    }
}

#[async_trait]
impl SourceClient for PerplexitySource {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn query(&self, kind: QueryKind, key: &ArtKey) -> SourceOutcome {
        query_endpoint(&self.endpoint, self.name(), kind, key).await
    }
}

/// xAI Grok source (OpenAI-compatible API)
pub struct XaiSource {
    endpoint: ChatEndpoint,
}

impl XaiSource {
    pub fn new(api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::new(XAI_CHAT_URL, api_key, "grok-beta")?,
        })
    }
}

#[async_trait]
impl SourceClient for XaiSource {
    fn name(&self) -> &'static str {
        "xai"
    }

    async fn query(&self, kind: QueryKind, key: &ArtKey) -> SourceOutcome {
        query_endpoint(&self.endpoint, self.name(), kind, key).await
    }
}
