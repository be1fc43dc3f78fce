//! Background enrichment queue and workers
//!
//! The slow, optional lookups (personal-blog discovery) run after the
//! response has already been returned. `submit` enqueues a job and returns
//! immediately; workers drain the queue and write results through the store's
//! merge-rule patch. Job outcomes are never observed by the request path.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::blog_client::BlogClient;
use crate::db::{ArtCacheStore, MediaPatch};
use crate::models::{ArtData, ArtKey};

const WORKER_COUNT: usize = 2;

/// Narrative-link discovery seam (implemented by the blog client)
#[async_trait]
pub trait NarrativeSearch: Send + Sync {
    async fn search_blog(&self, genre: &str, artists: &str, key: &ArtKey) -> Option<String>;
}

#[async_trait]
impl NarrativeSearch for BlogClient {
    async fn search_blog(&self, genre: &str, artists: &str, key: &ArtKey) -> Option<String> {
        BlogClient::search_blog(self, genre, artists, key).await
    }
}

/// One background enrichment job, scoped to a single key
#[derive(Debug, Clone)]
pub struct EnrichmentJob {
    pub key: ArtKey,
    pub popular_genre: String,
    pub popular_artists: String,
    pub timeless_genre: String,
    pub timeless_artists: String,
}

impl EnrichmentJob {
    pub fn for_data(data: &ArtData) -> Self {
        Self {
            key: data.key(),
            popular_genre: data.popular.genre.clone(),
            popular_artists: data.popular.artists.clone(),
            timeless_genre: data.timeless.genre.clone(),
            timeless_artists: data.timeless.artists.clone(),
        }
    }
}

/// Queue handle. Cheap to clone; submitting never blocks the caller.
#[derive(Clone)]
pub struct EnrichmentQueue {
    tx: mpsc::UnboundedSender<EnrichmentJob>,
}

impl EnrichmentQueue {
    /// Spawn the worker pool and return the submit handle.
    pub fn start(search: Arc<dyn NarrativeSearch>, store: ArtCacheStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..WORKER_COUNT {
            let rx = rx.clone();
            let search = search.clone();
            let store = store.clone();
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => run_job(worker, job, search.as_ref(), &store).await,
                        None => break,
                    }
                }
                debug!(worker, "Enrichment worker stopped");
            });
        }

        Self { tx }
    }

    /// A queue that drops every job, for configurations with no search
    /// backend.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Enqueue a job. Fire-and-forget: the caller never observes the outcome.
    pub fn submit(&self, job: EnrichmentJob) {
        if self.tx.send(job).is_err() {
            warn!("Enrichment queue unavailable, dropping job");
        }
    }
}

async fn run_job(worker: usize, job: EnrichmentJob, search: &dyn NarrativeSearch, store: &ArtCacheStore) {
    let job_id = Uuid::new_v4();
    info!(worker, %job_id, key = %job.key, "Background blog search starting");

    let (popular_url, timeless_url) = tokio::join!(
        search.search_blog(&job.popular_genre, &job.popular_artists, &job.key),
        search.search_blog(&job.timeless_genre, &job.timeless_artists, &job.key),
    );

    let found_popular = popular_url.is_some();
    let found_timeless = timeless_url.is_some();

    if found_popular || found_timeless {
        let patch = MediaPatch {
            popular_blog_url: popular_url,
            timeless_blog_url: timeless_url,
            ..Default::default()
        };
        if store.patch_media(&job.key, &patch).await {
            info!(%job_id, key = %job.key, "Cache updated with blog URLs");
        }
    }

    info!(
        %job_id,
        key = %job.key,
        found_popular,
        found_timeless,
        "Background blog search complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubSearch {
        url: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NarrativeSearch for StubSearch {
        async fn search_blog(&self, _genre: &str, _artists: &str, _key: &ArtKey) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.url.map(String::from)
        }
    }

    async fn seeded_store() -> (ArtCacheStore, ArtData) {
        // Single connection: an in-memory database exists per connection
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        let store = ArtCacheStore::new(pool);

        let data = ArtData {
            decade: "1970".to_string(),
            region: "North America".to_string(),
            art_form: "Music".to_string(),
            popular: ArtEntry::new("Disco", "Bee Gees", "Stayin' Alive", "Strings and struts."),
            timeless: ArtEntry::new("Punk", "Ramones", "Blitzkrieg Bop", "Three chords, no apology."),
        };
        store.upsert(&data).await;
        (store, data)
    }

    async fn wait_for_blog_url(store: &ArtCacheStore, key: &ArtKey) -> Option<String> {
        for _ in 0..50 {
            if let Some(data) = store.get(key).await {
                if data.popular.blog_url.is_some() {
                    return data.popular.blog_url;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn worker_patches_blog_urls() {
        let (store, data) = seeded_store().await;
        let search = Arc::new(StubSearch {
            url: Some("https://blog.example/disco"),
            calls: AtomicUsize::new(0),
        });

        let queue = EnrichmentQueue::start(search.clone(), store.clone());
        queue.submit(EnrichmentJob::for_data(&data));

        let url = wait_for_blog_url(&store, &data.key()).await;
        assert_eq!(url.as_deref(), Some("https://blog.example/disco"));
        // One search per entry
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn worker_patch_honors_merge_rule() {
        let (store, mut data) = seeded_store().await;
        data.popular.blog_url = Some("https://blog.example/first".to_string());
        store.upsert(&data).await;

        let search = Arc::new(StubSearch {
            url: Some("https://blog.example/second"),
            calls: AtomicUsize::new(0),
        });
        let queue = EnrichmentQueue::start(search, store.clone());
        queue.submit(EnrichmentJob::for_data(&data));

        // The timeless side is still absent, so wait for it to land
        for _ in 0..50 {
            if let Some(cached) = store.get(&data.key()).await {
                if cached.timeless.blog_url.is_some() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let cached = store.get(&data.key()).await.unwrap();
        // Present field untouched, absent field filled
        assert_eq!(cached.popular.blog_url.as_deref(), Some("https://blog.example/first"));
        assert_eq!(cached.timeless.blog_url.as_deref(), Some("https://blog.example/second"));
    }

    #[tokio::test]
    async fn disabled_queue_drops_jobs_silently() {
        let (_, data) = seeded_store().await;
        let queue = EnrichmentQueue::disabled();
        queue.submit(EnrichmentJob::for_data(&data));
    }
}
