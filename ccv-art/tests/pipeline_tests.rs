//! Orchestrator pipeline tests
//!
//! Drive `ArtService` end to end with stub sources, stub synthesis backends,
//! and a stub enricher over an in-memory SQLite store.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ccv_art::db::ArtCacheStore;
use ccv_art::models::{ArtEntry, ArtImage, ArtKey, QueryKind, SourceOutcome};
use ccv_art::services::{
    ArtEnricher, ArtService, EnrichmentQueue, NarrativeSearch, SourceClient, SynthesisBackend,
    Synthesizer,
};
use ccv_art::services::synthesizer::SynthesisError;

// ============================================================================
// Test doubles
// ============================================================================

struct StubSource {
    name: &'static str,
    reply: Option<(&'static str, &'static str)>,
    calls: Arc<AtomicUsize>,
}

impl StubSource {
    fn ok(name: &'static str, work: &'static str, rationale: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                name,
                reply: Some((work, rationale)),
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn failing(name: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                name,
                reply: None,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

#[async_trait]
impl SourceClient for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn query(&self, kind: QueryKind, _key: &ArtKey) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some((work, rationale)) => SourceOutcome::ok(self.name, kind, work, rationale),
            None => SourceOutcome::failed(self.name, kind, "connection refused"),
        }
    }
}

struct StubBackend {
    reply: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl StubBackend {
    fn ok(reply: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                reply: Some(reply),
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn failing() -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                reply: None,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

#[async_trait]
impl SynthesisBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(reply) => Ok(reply.to_string()),
            None => Err(SynthesisError::Api(503, "overloaded".to_string())),
        }
    }
}

/// Enricher that fills missing images and counts invocations
struct ImageEnricher {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ArtEnricher for ImageEnricher {
    async fn enrich(&self, key: &ArtKey, popular: &mut ArtEntry, timeless: &mut ArtEntry) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key.needs_image() {
            for entry in [popular, timeless] {
                if entry.image.is_none() {
                    entry.image = Some(ArtImage {
                        url: "https://images.example/found.jpg".to_string(),
                        source_url: "https://museum.example/found".to_string(),
                    });
                }
            }
        }
    }
}

/// Enricher that never fills anything
struct NoopEnricher;

#[async_trait]
impl ArtEnricher for NoopEnricher {
    async fn enrich(&self, _key: &ArtKey, _popular: &mut ArtEntry, _timeless: &mut ArtEntry) {}
}

struct StubSearch {
    url: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NarrativeSearch for StubSearch {
    async fn search_blog(&self, _genre: &str, _artists: &str, _key: &ArtKey) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(self.url.to_string())
    }
}

// ============================================================================
// Helpers
// ============================================================================

const FULL_REPLY: &str = "\
POPULAR_GENRE: Modal jazz
POPULAR_ARTISTS: Miles Davis
POPULAR_EXAMPLE: Kind of Blue
POPULAR_DESCRIPTION: Two sessions, no rehearsal, endless influence.

TIMELESS_GENRE: Free jazz
TIMELESS_ARTISTS: Ornette Coleman
TIMELESS_EXAMPLE: The Shape of Jazz to Come
TIMELESS_DESCRIPTION: The title wasn't bragging.";

async fn memory_store() -> ArtCacheStore {
    // Single connection: an in-memory database exists per connection
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    ccv_art::db::init_tables(&pool).await.unwrap();
    ArtCacheStore::new(pool)
}

fn service(
    sources: Vec<Arc<dyn SourceClient>>,
    primary: Arc<dyn SynthesisBackend>,
    secondary: Option<Arc<dyn SynthesisBackend>>,
    enricher: Arc<dyn ArtEnricher>,
    store: ArtCacheStore,
    queue: EnrichmentQueue,
) -> ArtService {
    ArtService::new(sources, Synthesizer::new(primary, secondary), enricher, store, queue)
}

fn music_key() -> ArtKey {
    ArtKey::new("1960", "Western Europe", "Music")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn quorum_failure_returns_none_without_synthesis_or_cache_write() {
    let (a, _) = StubSource::failing("a");
    let (b, _) = StubSource::failing("b");
    let (c, _) = StubSource::failing("c");
    let (backend, backend_calls) = StubBackend::ok(FULL_REPLY);
    let store = memory_store().await;

    let service = service(
        vec![a, b, c],
        backend,
        None,
        Arc::new(NoopEnricher),
        store.clone(),
        EnrichmentQueue::disabled(),
    );

    let key = music_key();
    assert!(service.resolve(&key).await.is_none());

    // Neither the synthesizer nor the store write path was touched
    assert_eq!(backend_calls.load(Ordering::SeqCst), 0);
    assert!(store.get(&key).await.is_none());
}

#[tokio::test]
async fn single_success_meets_quorum_and_becomes_majority() {
    let (a, _) = StubSource::failing("a");
    let (b, _) = StubSource::failing("b");
    let (c, _) = StubSource::ok("c", "Kind of Blue", "by Miles Davis - revolutionary modal jazz");
    // Non-conformant synthesis output forces the fallback chain
    let (backend, _) = StubBackend::ok("nothing usable here");
    let store = memory_store().await;

    let service = service(
        vec![a, b, c],
        backend,
        None,
        Arc::new(NoopEnricher),
        store.clone(),
        EnrichmentQueue::disabled(),
    );

    let data = service.resolve(&music_key()).await.unwrap();
    // The lone successful candidate is its own majority and feeds the name
    assert_eq!(data.popular.name, "Kind of Blue");
    assert_eq!(data.popular.description, "by Miles Davis - revolutionary modal jazz");
}

#[tokio::test]
async fn unanimous_sources_drive_the_synthesized_example() {
    let answer = ("Kind of Blue", "revolutionary modal jazz");
    let (a, _) = StubSource::ok("a", answer.0, answer.1);
    let (b, _) = StubSource::ok("b", answer.0, answer.1);
    let (c, _) = StubSource::ok("c", answer.0, answer.1);
    let (backend, _) = StubBackend::ok("no labeled fields in this reply");
    let store = memory_store().await;

    let service = service(
        vec![a, b, c],
        backend,
        None,
        Arc::new(NoopEnricher),
        store.clone(),
        EnrichmentQueue::disabled(),
    );

    let data = service.resolve(&music_key()).await.unwrap();
    // Majority-backed, not the placeholder
    assert_eq!(data.popular.name, "Kind of Blue");
    assert_eq!(data.timeless.name, "Kind of Blue");

    // Result was written back to the cache
    let cached = store.get(&music_key()).await.unwrap();
    assert_eq!(cached.popular.name, "Kind of Blue");
}

#[tokio::test]
async fn synthesis_failure_on_both_backends_is_terminal() {
    let (a, _) = StubSource::ok("a", "Kind of Blue", "modal");
    let (primary, primary_calls) = StubBackend::failing();
    let (secondary, secondary_calls) = StubBackend::failing();
    let store = memory_store().await;

    let service = service(
        vec![a],
        primary,
        Some(secondary as Arc<dyn SynthesisBackend>),
        Arc::new(NoopEnricher),
        store.clone(),
        EnrichmentQueue::disabled(),
    );

    let key = music_key();
    assert!(service.resolve(&key).await.is_none());
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    assert!(store.get(&key).await.is_none());
}

#[tokio::test]
async fn secondary_backend_rescues_the_pipeline() {
    let (a, _) = StubSource::ok("a", "Kind of Blue", "modal");
    let (primary, _) = StubBackend::failing();
    let (secondary, _) = StubBackend::ok(FULL_REPLY);
    let store = memory_store().await;

    let service = service(
        vec![a],
        primary,
        Some(secondary as Arc<dyn SynthesisBackend>),
        Arc::new(NoopEnricher),
        store,
        EnrichmentQueue::disabled(),
    );

    let data = service.resolve(&music_key()).await.unwrap();
    assert_eq!(data.popular.genre, "Modal jazz");
    assert_eq!(data.timeless.name, "The Shape of Jazz to Come");
}

#[tokio::test]
async fn cache_hit_returns_identical_records_without_refanning_out() {
    let (a, a_calls) = StubSource::ok("a", "One Hundred Years of Solitude", "the Buendías");
    let (backend, backend_calls) = StubBackend::ok(
        "POPULAR_GENRE: Magical realism\n\
         POPULAR_ARTISTS: Gabriel García Márquez\n\
         POPULAR_EXAMPLE: One Hundred Years of Solitude\n\
         POPULAR_DESCRIPTION: Seven generations of the same dream.\n\
         TIMELESS_GENRE: Magical realism\n\
         TIMELESS_ARTISTS: Gabriel García Márquez\n\
         TIMELESS_EXAMPLE: One Hundred Years of Solitude\n\
         TIMELESS_DESCRIPTION: Still rereading itself.",
    );
    let store = memory_store().await;

    // Literature requires no media, so a hit never re-enriches
    let key = ArtKey::new("1960", "South America", "Literature");
    let service = service(
        vec![a],
        backend,
        None,
        Arc::new(NoopEnricher),
        store,
        EnrichmentQueue::disabled(),
    );

    let first = service.resolve(&key).await.unwrap();
    assert_eq!(a_calls.load(Ordering::SeqCst), 2); // popular + timeless
    assert_eq!(backend_calls.load(Ordering::SeqCst), 1);

    let second = service.resolve(&key).await.unwrap();
    assert_eq!(first, second);
    // No fan-out, no synthesis on the hit
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_hit_with_missing_image_reenriches_exactly_once() {
    let (a, a_calls) = StubSource::failing("unused");
    let (backend, backend_calls) = StubBackend::ok(FULL_REPLY);
    let store = memory_store().await;

    let key = ArtKey::new("1940", "North America", "Visual Arts");
    let cached = ccv_art::models::ArtData {
        decade: key.decade.clone(),
        region: key.region.clone(),
        art_form: key.art_form.clone(),
        popular: ArtEntry::new("Regionalism", "Edward Hopper", "Nighthawks", "The diner at night."),
        timeless: ArtEntry::new("Abstract expressionism", "Jackson Pollock", "Mural", "Paint in motion."),
    };
    store.upsert(&cached).await;

    let enricher_calls = Arc::new(AtomicUsize::new(0));
    let service = service(
        vec![a],
        backend,
        None,
        Arc::new(ImageEnricher {
            calls: enricher_calls.clone(),
        }),
        store.clone(),
        EnrichmentQueue::disabled(),
    );

    let data = service.resolve(&key).await.unwrap();
    assert_eq!(enricher_calls.load(Ordering::SeqCst), 1);
    assert!(data.popular.image.is_some());
    assert!(data.timeless.image.is_some());
    // The hit path never fans out or synthesizes
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend_calls.load(Ordering::SeqCst), 0);

    // The enriched row was written back; a second hit is already complete
    let again = service.resolve(&key).await.unwrap();
    assert_eq!(enricher_calls.load(Ordering::SeqCst), 1);
    assert_eq!(again, data);
}

#[tokio::test]
async fn fresh_resolution_submits_background_blog_job() {
    let (a, _) = StubSource::ok("a", "Kind of Blue", "modal");
    let (backend, _) = StubBackend::ok(FULL_REPLY);
    let store = memory_store().await;

    let search_calls = Arc::new(AtomicUsize::new(0));
    let queue = EnrichmentQueue::start(
        Arc::new(StubSearch {
            url: "https://blog.example/jazz",
            calls: search_calls.clone(),
        }),
        store.clone(),
    );

    let service = service(
        vec![a],
        backend,
        None,
        Arc::new(NoopEnricher),
        store.clone(),
        queue,
    );

    let key = music_key();
    let data = service.resolve(&key).await.unwrap();
    // The response itself never carries the background result
    assert!(data.popular.blog_url.is_none());

    // The worker lands the patch shortly after
    let mut patched = None;
    for _ in 0..100 {
        if let Some(cached) = store.get(&key).await {
            if cached.popular.blog_url.is_some() {
                patched = cached.popular.blog_url;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(patched.as_deref(), Some("https://blog.example/jazz"));
    assert_eq!(search_calls.load(Ordering::SeqCst), 2);
}
