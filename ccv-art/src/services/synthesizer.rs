//! Synthesis of final entries from source outcomes
//!
//! Builds one combined prompt covering both sub-queries (one external call
//! instead of two), sends it to the primary backend with a single retry
//! against the secondary, and parses the labeled-field response. Parsing
//! never fails outright: each missing field falls back to the majority
//! value, then to the first successful outcome, then to a placeholder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::source_client::{ChatEndpoint, SourceError, OPENAI_CHAT_URL};
use crate::models::{ArtEntry, ArtKey, ConsensusOutcome, QueryKind, SourceOutcome};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const SYNTHESIS_TIMEOUT_SECS: u64 = 30;
const SYNTHESIS_MAX_TOKENS: u32 = 800;

const FALLBACK_GENRE: &str = "Uncategorized";
const FALLBACK_ARTISTS: &str = "Unknown artist";
const FALLBACK_NAME: &str = "Unknown Work";
const FALLBACK_DESCRIPTION: &str = "A notable work from this period.";

/// Synthesis errors
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Both the primary and secondary backend failed
    #[error("All synthesis backends failed (primary: {primary}; secondary: {secondary})")]
    Exhausted { primary: String, secondary: String },
}

impl From<SourceError> for SynthesisError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Network(msg) => SynthesisError::Network(msg),
            SourceError::Api(status, msg) => SynthesisError::Api(status, msg),
            SourceError::Parse(msg) => SynthesisError::Parse(msg),
        }
    }
}

/// One synthesis backend (an LLM that writes the final entries)
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError>;
}

// ============================================================================
// Backends
// ============================================================================

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessagesTurn<'a>>,
}

#[derive(Serialize)]
struct MessagesTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Anthropic messages-API backend (primary)
pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Result<Self, SynthesisError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SYNTHESIS_TIMEOUT_SECS))
            .build()
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        Ok(Self { http, api_key })
    }
}

#[async_trait]
impl SynthesisBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError> {
        let request = MessagesRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: SYNTHESIS_MAX_TOKENS,
            messages: vec![MessagesTurn {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api(status.as_u16(), detail));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Parse(e.to_string()))?;

        let text: String = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(SynthesisError::Parse("empty completion".to_string()));
        }

        Ok(text)
    }
}

/// OpenAI chat-API backend (secondary)
pub struct OpenAiBackend {
    endpoint: ChatEndpoint,
}

impl OpenAiBackend {
    pub fn new(api_key: String) -> Result<Self, SynthesisError> {
        Ok(Self {
            endpoint: ChatEndpoint::new(OPENAI_CHAT_URL, api_key, "gpt-4o-mini")?,
        })
    }
}

#[async_trait]
impl SynthesisBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError> {
        let text = self
            .endpoint
            .complete(
                "You are a concise, engaging art writer.",
                prompt,
                SYNTHESIS_MAX_TOKENS,
                0.7,
            )
            .await?;
        Ok(text)
    }
}

// ============================================================================
// Prompt building
// ============================================================================

fn type_label(kind: QueryKind) -> &'static str {
    match kind {
        QueryKind::Popular => "most popular",
        QueryKind::Timeless => "most timeless/enduring",
    }
}

/// Build the per-task block: formatted source responses plus the declared
/// majority, or an explicit use-your-judgment instruction when there is none.
fn build_task_prompt(
    key: &ArtKey,
    kind: QueryKind,
    outcomes: &[SourceOutcome],
    consensus: &ConsensusOutcome,
) -> String {
    let provider_text = outcomes
        .iter()
        .map(|o| {
            if o.success {
                format!("- {}: \"{}\" - {}", o.source.to_uppercase(), o.name, o.rationale)
            } else {
                format!(
                    "- {}: (failed: {})",
                    o.source.to_uppercase(),
                    o.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let header = format!(
        "{} independent AI sources were asked about the {} {} from {} in the {}.",
        outcomes.len(),
        type_label(kind),
        key.art_form.to_lowercase(),
        key.region,
        key.decade_label(),
    );

    match &consensus.majority {
        Some(majority) => format!(
            "{header}\n\nTheir responses:\n{provider_text}\n\n\
             The majority agreed on: \"{majority}\"\n\n\
             Write a short, engaging description (2-3 sentences max) about this work. \
             Be casual and friendly - focus on what makes it surprising, juicy, or fascinating. \
             No formal academic tone. Start directly with the interesting bit, \
             don't say \"This work...\" or similar."
        ),
        None => format!(
            "{header}\n\nTheir responses:\n{provider_text}\n\n\
             There's no clear majority. Using your judgment, pick the most accurate/notable \
             choice and write a short, engaging description (2-3 sentences max). \
             Be casual and friendly - focus on what makes it surprising, juicy, or fascinating. \
             No formal academic tone."
        ),
    }
}

/// Build the combined prompt for both sub-queries, with the labeled-field
/// output contract.
fn build_synthesis_prompt(
    key: &ArtKey,
    popular: &[SourceOutcome],
    timeless: &[SourceOutcome],
    popular_consensus: &ConsensusOutcome,
    timeless_consensus: &ConsensusOutcome,
) -> String {
    format!(
        "I need you to write two short entries for an art exploration app.\n\n\
         === TASK 1: MOST POPULAR ===\n{}\n\n\
         === TASK 2: MOST TIMELESS ===\n{}\n\n\
         Format your response exactly like this:\n\
         POPULAR_GENRE: [genre or movement, a few words]\n\
         POPULAR_ARTISTS: [key artist or artists]\n\
         POPULAR_EXAMPLE: [name of the work]\n\
         POPULAR_DESCRIPTION: [your engaging 2-3 sentence description]\n\n\
         TIMELESS_GENRE: [genre or movement, a few words]\n\
         TIMELESS_ARTISTS: [key artist or artists]\n\
         TIMELESS_EXAMPLE: [name of the work]\n\
         TIMELESS_DESCRIPTION: [your engaging 2-3 sentence description]",
        build_task_prompt(key, QueryKind::Popular, popular, popular_consensus),
        build_task_prompt(key, QueryKind::Timeless, timeless, timeless_consensus),
    )
}

// ============================================================================
// Response parsing
// ============================================================================

fn extract_field(text: &str, label: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(|rest| rest.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse one entry out of the combined response, applying the fallback chain
/// for every missing field.
fn parse_entry(
    text: &str,
    prefix: &str,
    consensus: &ConsensusOutcome,
    outcomes: &[SourceOutcome],
) -> ArtEntry {
    let first_success = outcomes.iter().find(|o| o.success && !o.name.is_empty());

    let name = extract_field(text, &format!("{prefix}_EXAMPLE:"))
        .or_else(|| consensus.majority.clone())
        .or_else(|| first_success.map(|o| o.name.clone()))
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    let description = extract_field(text, &format!("{prefix}_DESCRIPTION:"))
        .or_else(|| {
            first_success
                .map(|o| o.rationale.clone())
                .filter(|r| !r.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string());

    let genre = extract_field(text, &format!("{prefix}_GENRE:"))
        .unwrap_or_else(|| FALLBACK_GENRE.to_string());

    let artists = extract_field(text, &format!("{prefix}_ARTISTS:"))
        .unwrap_or_else(|| FALLBACK_ARTISTS.to_string());

    ArtEntry::new(genre, artists, name, description)
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Writes the final popular/timeless entries from source outcomes.
///
/// The primary backend gets one attempt; on failure the same prompt is
/// retried once against the secondary. Only both failing is terminal.
pub struct Synthesizer {
    primary: Arc<dyn SynthesisBackend>,
    secondary: Option<Arc<dyn SynthesisBackend>>,
}

impl Synthesizer {
    pub fn new(
        primary: Arc<dyn SynthesisBackend>,
        secondary: Option<Arc<dyn SynthesisBackend>>,
    ) -> Self {
        Self { primary, secondary }
    }

    pub async fn synthesize(
        &self,
        key: &ArtKey,
        popular: &[SourceOutcome],
        timeless: &[SourceOutcome],
        popular_consensus: &ConsensusOutcome,
        timeless_consensus: &ConsensusOutcome,
    ) -> Result<(ArtEntry, ArtEntry), SynthesisError> {
        let prompt =
            build_synthesis_prompt(key, popular, timeless, popular_consensus, timeless_consensus);

        let text = match self.primary.complete(&prompt).await {
            Ok(text) => text,
            Err(primary_err) => {
                warn!(
                    backend = self.primary.name(),
                    error = %primary_err,
                    "Primary synthesis backend failed, retrying on secondary"
                );
                match &self.secondary {
                    Some(secondary) => secondary.complete(&prompt).await.map_err(|secondary_err| {
                        SynthesisError::Exhausted {
                            primary: primary_err.to_string(),
                            secondary: secondary_err.to_string(),
                        }
                    })?,
                    None => {
                        return Err(SynthesisError::Exhausted {
                            primary: primary_err.to_string(),
                            secondary: "no secondary backend configured".to_string(),
                        })
                    }
                }
            }
        };

        Ok((
            parse_entry(&text, "POPULAR", popular_consensus, popular),
            parse_entry(&text, "TIMELESS", timeless_consensus, timeless),
        ))
    }
}
