//! Art resolution orchestrator
//!
//! Sequences the pipeline for one key: cache lookup → fan-out → consensus →
//! synthesis → enrichment → cache write → background job. Only two edges are
//! terminal failures (insufficient quorum, exhausted synthesis backends);
//! everything else degrades and still returns a record.

use std::sync::Arc;
use tracing::{error, info, warn};

use ccv_common::config::ServiceConfig;

use super::background::{EnrichmentJob, EnrichmentQueue};
use super::blog_client::BlogClient;
use super::consensus;
use super::enrichment::{ArtEnricher, MediaEnricher};
use super::fanout::FanOutCoordinator;
use super::source_client::{OpenAiSource, PerplexitySource, SourceClient, XaiSource};
use super::synthesizer::{AnthropicBackend, OpenAiBackend, SynthesisBackend, Synthesizer};
use crate::db::ArtCacheStore;
use crate::models::{ArtData, ArtKey};

/// Main service for resolving art data
pub struct ArtService {
    fanout: FanOutCoordinator,
    synthesizer: Synthesizer,
    enricher: Arc<dyn ArtEnricher>,
    store: ArtCacheStore,
    queue: EnrichmentQueue,
}

impl ArtService {
    pub fn new(
        sources: Vec<Arc<dyn SourceClient>>,
        synthesizer: Synthesizer,
        enricher: Arc<dyn ArtEnricher>,
        store: ArtCacheStore,
        queue: EnrichmentQueue,
    ) -> Self {
        Self {
            fanout: FanOutCoordinator::new(sources),
            synthesizer,
            enricher,
            store,
            queue,
        }
    }

    /// Wire up the real sources, backends, enricher, and background workers.
    pub fn from_config(config: &ServiceConfig, store: ArtCacheStore) -> ccv_common::Result<Self> {
        let keys = &config.keys;

        // Sources are constructed even without credentials; an unauthorized
        // call comes back as a failure outcome, which quorum handles.
        let sources: Vec<Arc<dyn SourceClient>> = vec![
            Arc::new(
                OpenAiSource::new(keys.openai.clone().unwrap_or_default())
                    .map_err(|e| ccv_common::Error::Internal(e.to_string()))?,
            ),
            Arc::new(
                PerplexitySource::new(keys.perplexity.clone().unwrap_or_default())
                    .map_err(|e| ccv_common::Error::Internal(e.to_string()))?,
            ),
            Arc::new(
                XaiSource::new(keys.xai.clone().unwrap_or_default())
                    .map_err(|e| ccv_common::Error::Internal(e.to_string()))?,
            ),
        ];

        let primary: Arc<dyn SynthesisBackend> = Arc::new(
            AnthropicBackend::new(keys.anthropic.clone().unwrap_or_default())
                .map_err(|e| ccv_common::Error::Internal(e.to_string()))?,
        );
        let secondary: Option<Arc<dyn SynthesisBackend>> = match &keys.openai {
            Some(api_key) => Some(Arc::new(
                OpenAiBackend::new(api_key.clone())
                    .map_err(|e| ccv_common::Error::Internal(e.to_string()))?,
            )),
            None => None,
        };
        let synthesizer = Synthesizer::new(primary, secondary);

        let enricher = Arc::new(MediaEnricher::from_config(config));

        let queue = match &keys.perplexity {
            Some(api_key) => {
                let blog = BlogClient::new(api_key.clone())
                    .map_err(|e| ccv_common::Error::Internal(e.to_string()))?;
                EnrichmentQueue::start(Arc::new(blog), store.clone())
            }
            None => {
                warn!("Perplexity API key not configured, background blog search disabled");
                EnrichmentQueue::disabled()
            }
        };

        Ok(Self::new(sources, synthesizer, enricher, store, queue))
    }

    /// Resolve art data for a key.
    ///
    /// Serves from cache when possible (re-running enrichment once for
    /// category-required fields that are still absent); otherwise runs the
    /// full pipeline. Returns None only on insufficient quorum or exhausted
    /// synthesis backends.
    pub async fn resolve(&self, key: &ArtKey) -> Option<ArtData> {
        info!(key = %key, "Checking cache");
        if let Some(mut cached) = self.store.get(key).await {
            info!(key = %key, "Cache hit");

            if needs_reenrich(key, &cached) {
                info!(key = %key, "Cache hit but required media missing, re-enriching");
                self.enricher
                    .enrich(key, &mut cached.popular, &mut cached.timeless)
                    .await;
                self.store.upsert(&cached).await;
            }

            return Some(cached);
        }

        info!(key = %key, "Cache miss, querying sources");
        let outcomes = self.fanout.query_all(key).await;

        if !outcomes.quorum_met() {
            error!(key = %key, "Not enough successful source responses");
            for failure in outcomes.failures() {
                error!(
                    source = failure.source,
                    kind = %failure.kind,
                    error = failure.error.as_deref().unwrap_or("unknown error"),
                    "Source failure"
                );
            }
            return None;
        }

        let popular_consensus = consensus::resolve(&outcomes.popular);
        let timeless_consensus = consensus::resolve(&outcomes.timeless);

        info!(
            key = %key,
            popular_majority = popular_consensus.majority.as_deref().unwrap_or("(none)"),
            timeless_majority = timeless_consensus.majority.as_deref().unwrap_or("(none)"),
            "Synthesizing"
        );

        let (mut popular, mut timeless) = match self
            .synthesizer
            .synthesize(
                key,
                &outcomes.popular,
                &outcomes.timeless,
                &popular_consensus,
                &timeless_consensus,
            )
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                error!(key = %key, error = %e, "Synthesis failed");
                return None;
            }
        };

        self.enricher.enrich(key, &mut popular, &mut timeless).await;

        let data = ArtData {
            decade: key.decade.clone(),
            region: key.region.clone(),
            art_form: key.art_form.clone(),
            popular,
            timeless,
        };

        if self.store.upsert(&data).await {
            info!(key = %key, "Cached result");
        }

        self.queue.submit(EnrichmentJob::for_data(&data));

        Some(data)
    }

    /// Invalidate a specific cache entry.
    pub async fn invalidate(&self, key: &ArtKey) -> bool {
        self.store.delete_one(key).await
    }

    /// Clear all cached data. Returns the number of deleted entries.
    pub async fn clear_cache(&self) -> i64 {
        self.store.delete_all().await
    }
}

/// Whether a cached row is missing media its category requires
fn needs_reenrich(key: &ArtKey, data: &ArtData) -> bool {
    if key.needs_image() && (data.popular.image.is_none() || data.timeless.image.is_none()) {
        return true;
    }
    if key.needs_media() && (data.popular.media.is_none() || data.timeless.media.is_none()) {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtEntry, ArtImage};

    fn entry_with_image() -> ArtEntry {
        let mut entry = ArtEntry::new("Surrealism", "Dalí", "The Persistence of Memory", "Clocks.");
        entry.image = Some(ArtImage {
            url: "https://images.example/x.jpg".to_string(),
            source_url: "https://museum.example/x".to_string(),
        });
        entry
    }

    #[test]
    fn reenrich_only_when_category_requires_missing_media() {
        let key = ArtKey::new("1930", "Western Europe", "Visual Arts");
        let data = ArtData {
            decade: "1930".to_string(),
            region: "Western Europe".to_string(),
            art_form: "Visual Arts".to_string(),
            popular: entry_with_image(),
            timeless: ArtEntry::new("Cubism", "Picasso", "Guernica", "War on canvas."),
        };
        // One image missing for a Visual Arts key
        assert!(needs_reenrich(&key, &data));

        let mut complete = data.clone();
        complete.timeless = entry_with_image();
        assert!(!needs_reenrich(&key, &complete));

        // Literature requires neither images nor media
        let key = ArtKey::new("1930", "Western Europe", "Literature");
        let mut plain = data.clone();
        plain.art_form = "Literature".to_string();
        assert!(!needs_reenrich(&key, &plain));
    }
}
