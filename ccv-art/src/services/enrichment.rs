//! Media enrichment of synthesized entries
//!
//! Category-gated, best-effort augmentation: artwork images for Visual Arts,
//! playable media (track first, video fallback) and sales figures for Music.
//! Only absent fields are filled; a provider failure never touches the entry.

use async_trait::async_trait;
use ccv_common::config::ServiceConfig;
use tracing::warn;

use super::museum_client::MuseumClient;
use super::sales_client::SalesClient;
use super::track_client::TrackClient;
use super::video_client::VideoClient;
use crate::models::{ArtEntry, ArtImage, ArtKey, MediaKind, MediaRef};

/// Best-effort enrichment seam. Implementations fill absent media fields in
/// place and never fail.
#[async_trait]
pub trait ArtEnricher: Send + Sync {
    async fn enrich(&self, key: &ArtKey, popular: &mut ArtEntry, timeless: &mut ArtEntry);
}

/// Enricher backed by the real lookup clients. Clients whose credentials are
/// not configured are absent and their fields simply stay unfilled.
pub struct MediaEnricher {
    museum: Option<MuseumClient>,
    tracks: Option<TrackClient>,
    videos: Option<VideoClient>,
    sales: Option<SalesClient>,
}

impl MediaEnricher {
    pub fn new(
        museum: Option<MuseumClient>,
        tracks: Option<TrackClient>,
        videos: Option<VideoClient>,
        sales: Option<SalesClient>,
    ) -> Self {
        Self {
            museum,
            tracks,
            videos,
            sales,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let museum = match MuseumClient::new() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Museum client unavailable");
                None
            }
        };

        let tracks = match (&config.keys.spotify_client_id, &config.keys.spotify_client_secret) {
            (Some(id), Some(secret)) => match TrackClient::new(id.clone(), secret.clone()) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "Track client unavailable");
                    None
                }
            },
            _ => {
                warn!("Spotify credentials not configured, track enrichment disabled");
                None
            }
        };

        let (videos, sales) = match &config.keys.perplexity {
            Some(api_key) => {
                let videos = VideoClient::new(api_key.clone())
                    .map_err(|e| warn!(error = %e, "Video client unavailable"))
                    .ok();
                let sales = SalesClient::new(api_key.clone())
                    .map_err(|e| warn!(error = %e, "Sales client unavailable"))
                    .ok();
                (videos, sales)
            }
            None => {
                warn!("Perplexity API key not configured, video/sales enrichment disabled");
                (None, None)
            }
        };

        Self::new(museum, tracks, videos, sales)
    }

    async fn find_image(&self, key: &ArtKey, entry: &ArtEntry) -> Option<ArtImage> {
        if !key.needs_image() || entry.image.is_some() {
            return None;
        }
        let found = self.museum.as_ref()?.search_artwork(&entry.name).await?;
        Some(ArtImage {
            url: found.thumbnail_url,
            source_url: found.source_url,
        })
    }

    /// Playable media: a streamable track when one can be found, otherwise a
    /// video.
    async fn find_media(&self, key: &ArtKey, entry: &ArtEntry) -> Option<MediaRef> {
        if !key.needs_media() || entry.media.is_some() {
            return None;
        }

        if let Some(client) = &self.tracks {
            if let Some(track) = client.search_track(&entry.name, &key.decade).await {
                return Some(MediaRef {
                    kind: MediaKind::Track,
                    title: track.name,
                    embed_url: track.embed_url,
                    external_url: track.external_url,
                });
            }
        }

        if let Some(client) = &self.videos {
            if let Some(video) = client.search_video(&entry.name, &key.decade).await {
                return Some(MediaRef {
                    kind: MediaKind::Video,
                    title: video.title,
                    embed_url: video.embed_url,
                    external_url: video.url,
                });
            }
        }

        None
    }

    async fn find_sales(&self, key: &ArtKey, entry: &ArtEntry) -> Option<String> {
        if !key.needs_media() || entry.sales.is_some() {
            return None;
        }
        self.sales
            .as_ref()?
            .lookup_sales(&entry.name, &entry.artists)
            .await
    }

    async fn fill_entry(&self, key: &ArtKey, entry: &mut ArtEntry) {
        let (image, media, sales) = tokio::join!(
            self.find_image(key, entry),
            self.find_media(key, entry),
            self.find_sales(key, entry),
        );

        if image.is_some() {
            entry.image = image;
        }
        if media.is_some() {
            entry.media = media;
        }
        if sales.is_some() {
            entry.sales = sales;
        }
    }
}

#[async_trait]
impl ArtEnricher for MediaEnricher {
    async fn enrich(&self, key: &ArtKey, popular: &mut ArtEntry, timeless: &mut ArtEntry) {
        tokio::join!(
            self.fill_entry(key, popular),
            self.fill_entry(key, timeless),
        );
    }
}
