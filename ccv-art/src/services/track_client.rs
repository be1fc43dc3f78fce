//! Streaming-track search client (Spotify Web API)
//!
//! Client-credentials auth with a lazily refreshed token held in an explicit
//! `TokenCache`. Search tries a decade-scoped query first and falls back to
//! the plain query on zero results. Every failure degrades to None.

use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const TOKEN_TIMEOUT_SECS: u64 = 10;
const SEARCH_TIMEOUT_SECS: u64 = 15;
/// Refresh this long before the token actually expires
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Access token with its expiry, refreshed lazily behind a mutex
pub struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Return the cached token if it is still valid past the expiry buffer.
    pub async fn get(&self) -> Option<String> {
        let guard = self.inner.lock().await;
        guard
            .as_ref()
            .filter(|t| Instant::now() + TOKEN_EXPIRY_BUFFER < t.expires_at)
            .map(|t| t.token.clone())
    }

    /// Store a fresh token with its lifetime in seconds.
    pub async fn store(&self, token: String, expires_in_secs: u64) {
        let mut guard = self.inner.lock().await;
        *guard = Some(CachedToken {
            token,
            expires_at: Instant::now() + Duration::from_secs(expires_in_secs),
        });
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One streamable track
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyTrack {
    pub track_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub preview_url: Option<String>,
    pub embed_url: String,
    pub external_url: String,
    pub album_image_url: Option<String>,
}

/// Clean up the search query: strip surrounding quotes and a trailing
/// "by Artist" (the track name is what gets searched).
pub fn clean_search_query(query: &str) -> String {
    let query = query.trim().trim_matches(|c: char| c == '"' || c == '\'');

    match query.to_lowercase().find(" by ") {
        Some(pos) => query[..pos].trim().to_string(),
        None => query.to_string(),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Deserialize)]
struct TrackItem {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    #[serde(default)]
    album: Option<AlbumItem>,
    preview_url: Option<String>,
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Deserialize, Default)]
struct AlbumItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<AlbumImage>,
}

#[derive(Deserialize)]
struct AlbumImage {
    url: String,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

/// Track search client
pub struct TrackClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_cache: TokenCache,
}

impl TrackClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            token_cache: TokenCache::new(),
        })
    }

    /// Get an access token via the client-credentials flow, reusing the
    /// cached one while it is valid.
    async fn access_token(&self) -> Option<String> {
        if let Some(token) = self.token_cache.get().await {
            return Some(token);
        }

        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let result = self
            .http
            .post(TOKEN_URL)
            .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Track token request failed");
                return None;
            }
        };

        let token: TokenResponse = match response.json().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Track token response unreadable");
                return None;
            }
        };

        self.token_cache
            .store(token.access_token.clone(), token.expires_in)
            .await;
        info!("Track access token refreshed");

        Some(token.access_token)
    }

    /// Search for a track. The decade, when parseable as a year, narrows the
    /// search to that ten-year range first. Best-effort: failures degrade to
    /// None.
    pub async fn search_track(&self, query: &str, decade: &str) -> Option<SpotifyTrack> {
        let token = self.access_token().await?;

        let clean_query = clean_search_query(query);
        if clean_query.is_empty() {
            return None;
        }

        // Narrow to the decade's year range when possible
        let scoped_query = match decade.parse::<u32>() {
            Ok(year) => format!("{} year:{}-{}", clean_query, year, year + 9),
            Err(_) => clean_query.clone(),
        };

        info!(query = %scoped_query, "Track search");

        let mut items = self.run_search(&token, &scoped_query).await?;
        if items.is_empty() && scoped_query != clean_query {
            info!(query = %clean_query, "Track search retry without year filter");
            items = self.run_search(&token, &clean_query).await?;
        }

        let track = items.into_iter().next()?;
        let album = track.album.unwrap_or_default();

        // Prefer the medium (300px) album image
        let album_image_url = album
            .images
            .iter()
            .find(|img| img.height == Some(300))
            .or_else(|| album.images.first())
            .map(|img| img.url.clone());

        let found = SpotifyTrack {
            embed_url: format!("https://open.spotify.com/embed/track/{}", track.id),
            external_url: track
                .external_urls
                .spotify
                .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", track.id)),
            track_id: track.id,
            name: track.name,
            artist: track
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: album.name,
            preview_url: track.preview_url,
            album_image_url,
        };

        info!(track = %found.name, artist = %found.artist, "Track found");
        Some(found)
    }

    async fn run_search(&self, token: &str, query: &str) -> Option<Vec<TrackItem>> {
        let result = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", "5")])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(query, error = %e, "Track search failed");
                return None;
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(data) => Some(data.tracks.map(|t| t.items).unwrap_or_default()),
            Err(e) => {
                warn!(query, error = %e, "Track search response unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_and_attribution() {
        assert_eq!(clean_search_query("\"Kind of Blue\" by Miles Davis"), "Kind of Blue");
        assert_eq!(clean_search_query("'Hey Jude'"), "Hey Jude");
        assert_eq!(clean_search_query("Abbey Road"), "Abbey Road");
    }

    #[tokio::test]
    async fn token_cache_honors_expiry_buffer() {
        let cache = TokenCache::new();
        assert!(cache.get().await.is_none());

        // Expires inside the 60s buffer: treated as already stale
        cache.store("short-lived".to_string(), 30).await;
        assert!(cache.get().await.is_none());

        // Plenty of lifetime left: served from cache
        cache.store("long-lived".to_string(), 3600).await;
        assert_eq!(cache.get().await.as_deref(), Some("long-lived"));
    }
}
