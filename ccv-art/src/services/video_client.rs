//! Video lookup via the Perplexity search model
//!
//! Asks a web-search-capable model for the official video of a work and
//! extracts a YouTube id from whatever comes back. Best-effort only.

use tracing::{info, warn};

use super::source_client::{ChatEndpoint, PERPLEXITY_CHAT_URL};

const LOOKUP_TIMEOUT_SECS: u64 = 15;
const VIDEO_ID_LEN: usize = 11;

/// One playable video
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubeVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub embed_url: String,
}

/// Extract a YouTube video id from a watch/short/embed URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    const PREFIXES: [&str; 4] = [
        "youtube.com/watch?v=",
        "youtu.be/",
        "youtube.com/embed/",
        "youtube.com/v/",
    ];

    for prefix in PREFIXES {
        if let Some(pos) = url.find(prefix) {
            let id: String = url[pos + prefix.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                .take(VIDEO_ID_LEN)
                .collect();
            if id.len() == VIDEO_ID_LEN {
                return Some(id);
            }
        }
    }

    None
}

/// Video search client
pub struct VideoClient {
    endpoint: ChatEndpoint,
}

impl VideoClient {
    pub fn new(perplexity_api_key: String) -> Result<Self, super::source_client::SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::with_timeout(
                PERPLEXITY_CHAT_URL,
                perplexity_api_key,
                "sonar",
                LOOKUP_TIMEOUT_SECS,
            )?,
        })
    }

    /// Find a video for a work. Best-effort: failures and unusable answers
    /// degrade to None.
    pub async fn search_video(&self, query: &str, decade: &str) -> Option<YouTubeVideo> {
        let decade_label = if decade.is_empty() {
            String::new()
        } else {
            format!("{}s", decade)
        };

        let prompt = format!(
            "Find the official YouTube video or best quality video for: \"{}\" {}\n\n\
             Return ONLY the YouTube URL (youtube.com or youtu.be link), nothing else.\n\
             If you can't find it, return \"NONE\".",
            query, decade_label
        );

        let result = self
            .endpoint
            .complete(
                "You find YouTube video URLs. Return only the URL, no explanation.",
                &prompt,
                100,
                0.1,
            )
            .await;

        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                warn!(query, error = %e, "Video search failed");
                return None;
            }
        };

        if answer.to_uppercase().contains("NONE") || !answer.to_lowercase().contains("youtube") {
            info!(query, "No video found");
            return None;
        }

        let video_id = answer
            .split_whitespace()
            .filter(|token| token.starts_with("http"))
            .find_map(extract_video_id)?;

        let video = YouTubeVideo {
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            embed_url: format!("https://www.youtube.com/embed/{}", video_id),
            video_id,
            title: query.to_string(),
        };

        info!(query, video_id = %video.video_id, "Video found");
        Some(video)
    }
}
