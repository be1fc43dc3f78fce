//! Museum collection API client for artwork images
//!
//! Searches the Met's public collection API for a public-domain image of a
//! named artwork: exact cleaned-name query first, reduced keyword query on
//! zero results, inspecting up to a bounded number of candidate objects.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const BASE_URL: &str = "https://collectionapi.metmuseum.org/public/collection/v1";
const USER_AGENT: &str = "ChronoCanvas/1.0 (Art History Education App; contact@example.com)";
const LOOKUP_TIMEOUT_SECS: u64 = 15;
/// Candidate objects to inspect before giving up
const MAX_CANDIDATES: usize = 10;

/// Image data for one artwork
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkImage {
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub artist: Option<String>,
    pub source_url: String,
}

/// Clean an artwork name for better search results: strip surrounding
/// quotes, a trailing "by <artist>", and a trailing parenthetical note.
pub fn clean_artwork_name(name: &str) -> String {
    let mut name = name
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .to_string();

    // Remove "by Artist Name" suffix (case-insensitive)
    if let Some(pos) = name.to_lowercase().find(" by ") {
        name.truncate(pos);
    }

    // Remove a trailing parenthetical note
    let trimmed = name.trim_end();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            name.truncate(open);
        }
    }

    name.trim().to_string()
}

/// Reduced keyword query: the first three words longer than 3 characters
pub fn extract_keywords(name: &str) -> String {
    name.split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(rename = "objectIDs")]
    object_ids: Option<Vec<u64>>,
}

#[derive(Deserialize)]
struct ObjectResponse {
    #[serde(rename = "primaryImage", default)]
    primary_image: String,
    #[serde(rename = "primaryImageSmall", default)]
    primary_image_small: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "artistDisplayName", default)]
    artist_display_name: String,
    #[serde(rename = "objectURL", default)]
    object_url: String,
}

/// Museum collection API client
pub struct MuseumClient {
    http: reqwest::Client,
}

impl MuseumClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;

        Ok(Self { http })
    }

    /// Search for an artwork image. Best-effort: any failure degrades to None.
    pub async fn search_artwork(&self, artwork_name: &str) -> Option<ArtworkImage> {
        if artwork_name.is_empty() {
            return None;
        }

        let clean_name = clean_artwork_name(artwork_name);
        info!(query = %clean_name, original = %artwork_name, "Museum image search");

        if let Some(image) = self.search(&clean_name).await {
            return Some(image);
        }

        // Fallback to keyword search
        let keywords = extract_keywords(&clean_name);
        if !keywords.is_empty() && keywords != clean_name {
            info!(keywords = %keywords, "Museum fallback keyword search");
            return self.search(&keywords).await;
        }

        None
    }

    async fn search(&self, query: &str) -> Option<ArtworkImage> {
        let result = self
            .http
            .get(format!("{}/search", BASE_URL))
            .query(&[("hasImages", "true"), ("isPublicDomain", "true"), ("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(query, error = %e, "Museum search failed");
                return None;
            }
        };

        let data: SearchResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(query, error = %e, "Museum search response unreadable");
                return None;
            }
        };

        info!(query, total = data.total, "Museum search results");

        let object_ids = data.object_ids.unwrap_or_default();
        for object_id in object_ids.into_iter().take(MAX_CANDIDATES) {
            if let Some(image) = self.object_details(object_id).await {
                return Some(image);
            }
        }

        None
    }

    async fn object_details(&self, object_id: u64) -> Option<ArtworkImage> {
        let data: ObjectResponse = self
            .http
            .get(format!("{}/objects/{}", BASE_URL, object_id))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .ok()?
            .json()
            .await
            .ok()?;

        // Only candidates with a retrievable image count
        if data.primary_image.is_empty() && data.primary_image_small.is_empty() {
            return None;
        }

        let url = if !data.primary_image.is_empty() {
            data.primary_image.clone()
        } else {
            data.primary_image_small.clone()
        };
        let thumbnail_url = if !data.primary_image_small.is_empty() {
            data.primary_image_small
        } else {
            data.primary_image
        };

        Some(ArtworkImage {
            url,
            thumbnail_url,
            title: data.title,
            artist: (!data.artist_display_name.is_empty()).then_some(data.artist_display_name),
            source_url: data.object_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_attribution_and_parentheticals() {
        assert_eq!(clean_artwork_name("\"Starry Night\" by Vincent van Gogh"), "Starry Night");
        assert_eq!(clean_artwork_name("'Guernica'"), "Guernica");
        assert_eq!(clean_artwork_name("Nighthawks (1942 oil painting)"), "Nighthawks");
        assert_eq!(
            clean_artwork_name("\"The Persistence of Memory\" by Dalí (melting clocks)"),
            "The Persistence of Memory"
        );
        assert_eq!(clean_artwork_name("  Water Lilies  "), "Water Lilies");
    }

    #[test]
    fn clean_is_case_insensitive_on_attribution() {
        assert_eq!(clean_artwork_name("Campbell's Soup Cans BY Andy Warhol"), "Campbell's Soup Cans");
    }

    #[test]
    fn keywords_take_first_three_long_words() {
        assert_eq!(extract_keywords("The Persistence of Memory"), "Persistence Memory");
        assert_eq!(
            extract_keywords("Impression Sunrise Harbor Morning Light"),
            "Impression Sunrise Harbor"
        );
        assert_eq!(extract_keywords("a of in"), "");
    }
}
