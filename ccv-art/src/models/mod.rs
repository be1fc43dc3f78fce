//! Domain models for ccv-art

pub mod art;

pub use art::{
    ArtData, ArtDataResponse, ArtEntry, ArtImage, ArtKey, ConsensusOutcome, MediaKind, MediaRef,
    QueryKind, SourceOutcome,
};
