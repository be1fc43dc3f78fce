//! Service layer for ccv-art
//!
//! The resolution pipeline and its collaborators: source clients, fan-out,
//! consensus, synthesis, media enrichment, and the background worker.

pub mod art_service;
pub mod background;
pub mod blog_client;
pub mod consensus;
pub mod enrichment;
pub mod fanout;
pub mod museum_client;
pub mod sales_client;
pub mod source_client;
pub mod synthesizer;
pub mod track_client;
pub mod video_client;

pub use art_service::ArtService;
pub use background::{EnrichmentJob, EnrichmentQueue, NarrativeSearch};
pub use enrichment::{ArtEnricher, MediaEnricher};
pub use fanout::{FanOutCoordinator, FanOutResult};
pub use source_client::{OpenAiSource, PerplexitySource, SourceClient, XaiSource};
pub use synthesizer::{AnthropicBackend, OpenAiBackend, SynthesisBackend, Synthesizer};
