//! Personal-blog discovery via the Perplexity search model
//!
//! Finds one genuinely personal blog post about a genre (not Wikipedia, not
//! a catalog). Slow and optional: this runs from the background worker.

use tracing::{info, warn};

use super::source_client::{ChatEndpoint, SourceError, PERPLEXITY_CHAT_URL};
use crate::models::ArtKey;

const LOOKUP_TIMEOUT_SECS: u64 = 30;

/// Blog search client
pub struct BlogClient {
    endpoint: ChatEndpoint,
}

impl BlogClient {
    pub fn new(perplexity_api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::with_timeout(
                PERPLEXITY_CHAT_URL,
                perplexity_api_key,
                "sonar",
                LOOKUP_TIMEOUT_SECS,
            )?,
        })
    }

    /// Search for one personal blog post about a genre. Best-effort:
    /// failures and non-URL answers degrade to None.
    pub async fn search_blog(&self, genre: &str, artists: &str, key: &ArtKey) -> Option<String> {
        let prompt = format!(
            "Find me ONE personal blog post (not Wikipedia, not marketing, not a database or catalog)\n\
             where someone writes from their heart about {genre} {art_form} from {region} in the {decade_label}.\n\n\
             I want a blog where a real person shares their personal connection to this art - maybe they\n\
             discovered it, or it changed their life, or they have memories attached to it. Someone writing\n\
             authentically about {artists}.\n\n\
             Requirements:\n\
             - Must be a personal blog or essay (Medium, Substack, personal sites, etc.)\n\
             - NOT Wikipedia, AllMusic, Discogs, or any database/catalog\n\
             - NOT marketing or promotional content\n\
             - The author should be sharing personal thoughts/feelings\n\
             - Preferably about {genre} specifically\n\n\
             Return ONLY the URL of the best matching blog post, nothing else. \
             If you can't find a good personal blog, return \"NONE\".",
            genre = genre,
            artists = artists,
            art_form = key.art_form.to_lowercase(),
            region = key.region,
            decade_label = key.decade_label(),
        );

        let result = self
            .endpoint
            .complete(
                "You are a helpful assistant that finds personal blog posts. Return only URLs, no explanations.",
                &prompt,
                200,
                0.3,
            )
            .await;

        let answer = match result {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(genre, error = %e, "Blog search failed");
                return None;
            }
        };

        if answer == "NONE" || !answer.starts_with("http") {
            info!(genre, "No personal blog found");
            return None;
        }

        // Take just the URL even if extra text sneaks in
        let url = answer.split_whitespace().next().unwrap_or_default();
        if url.starts_with("http") {
            info!(genre, url, "Personal blog found");
            Some(url.to_string())
        } else {
            None
        }
    }
}
