//! Core types for the art resolution pipeline
//!
//! One cache row per (decade, region, art form) key, holding two synthesized
//! entries: the "popular" pick of the decade and the "timeless" one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Art form that gets artwork image enrichment
pub const VISUAL_ARTS: &str = "Visual Arts";
/// Art form that gets playable media + sales enrichment
pub const MUSIC: &str = "Music";

/// Composite cache key. Values are opaque strings owned by the caller;
/// the service validates shape only (length, no control characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtKey {
    pub decade: String,
    pub region: String,
    pub art_form: String,
}

impl ArtKey {
    pub fn new(
        decade: impl Into<String>,
        region: impl Into<String>,
        art_form: impl Into<String>,
    ) -> Self {
        Self {
            decade: decade.into(),
            region: region.into(),
            art_form: art_form.into(),
        }
    }

    /// Decade label used in prompts, e.g. "1960s"
    pub fn decade_label(&self) -> String {
        format!("{}s", self.decade)
    }

    /// Whether this art form gets artwork image enrichment
    pub fn needs_image(&self) -> bool {
        self.art_form == VISUAL_ARTS
    }

    /// Whether this art form gets playable media + sales enrichment
    pub fn needs_media(&self) -> bool {
        self.art_form == MUSIC
    }
}

impl fmt::Display for ArtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.decade, self.region, self.art_form)
    }
}

/// Which of the two independent sub-queries an outcome belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Popular,
    Timeless,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Popular => "popular",
            QueryKind::Timeless => "timeless",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's answer to one sub-query. Immutable once produced; failures
/// are carried here rather than raised.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// Source identifier (e.g. "openai")
    pub source: &'static str,
    /// Sub-query this outcome answers
    pub kind: QueryKind,
    /// Extracted work name / category label (empty on failure)
    pub name: String,
    /// Extracted brief rationale (empty on failure)
    pub rationale: String,
    /// Whether the source call and parse succeeded
    pub success: bool,
    /// Error detail when not successful
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn ok(
        source: &'static str,
        kind: QueryKind,
        name: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind,
            name: name.into(),
            rationale: rationale.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(source: &'static str, kind: QueryKind, error: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            name: String::new(),
            rationale: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Majority decision over one sub-query's successful outcomes
#[derive(Debug, Clone, Default)]
pub struct ConsensusOutcome {
    /// Majority value in its original casing, if one exists
    pub majority: Option<String>,
    /// All successful candidates, raw (non-normalized)
    pub candidates: Vec<String>,
}

/// Artwork image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtImage {
    pub url: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
}

/// Playable media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Track => "track",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(MediaKind::Track),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Playable media reference (a streamable track, or a video fallback)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub kind: MediaKind,
    pub title: String,
    pub embed_url: String,
    pub external_url: String,
}

/// One synthesized entry (popular or timeless) for a key.
///
/// The genre/artists/name/description core comes from synthesis; the optional
/// fields are best-effort enrichment and may be filled later by patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtEntry {
    pub genre: String,
    pub artists: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ArtImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    #[serde(rename = "blogUrl", skip_serializing_if = "Option::is_none")]
    pub blog_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales: Option<String>,
}

impl ArtEntry {
    pub fn new(
        genre: impl Into<String>,
        artists: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            genre: genre.into(),
            artists: artists.into(),
            name: name.into(),
            description: description.into(),
            image: None,
            media: None,
            blog_url: None,
            sales: None,
        }
    }
}

/// Complete resolved data for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtData {
    pub decade: String,
    pub region: String,
    #[serde(rename = "artForm")]
    pub art_form: String,
    pub popular: ArtEntry,
    pub timeless: ArtEntry,
}

impl ArtData {
    pub fn key(&self) -> ArtKey {
        ArtKey::new(&self.decade, &self.region, &self.art_form)
    }
}

/// Response wrapper for the resolve operation
#[derive(Debug, Serialize)]
pub struct ArtDataResponse {
    pub data: Option<ArtData>,
    pub found: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_label_appends_s() {
        let key = ArtKey::new("1960", "Western Europe", "Music");
        assert_eq!(key.decade_label(), "1960s");
    }

    #[test]
    fn enrichment_gating_by_art_form() {
        assert!(ArtKey::new("1920", "North America", VISUAL_ARTS).needs_image());
        assert!(!ArtKey::new("1920", "North America", VISUAL_ARTS).needs_media());
        assert!(ArtKey::new("1920", "North America", MUSIC).needs_media());
        assert!(!ArtKey::new("1920", "North America", "Literature").needs_image());
        assert!(!ArtKey::new("1920", "North America", "Literature").needs_media());
    }

    #[test]
    fn media_kind_round_trips_as_str() {
        assert_eq!(MediaKind::parse("track"), Some(MediaKind::Track));
        assert_eq!(MediaKind::parse("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::parse("bogus"), None);
        assert_eq!(MediaKind::parse(MediaKind::Track.as_str()), Some(MediaKind::Track));
    }

    #[test]
    fn entry_serializes_without_absent_media() {
        let entry = ArtEntry::new("Modal jazz", "Miles Davis", "Kind of Blue", "A landmark.");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("image").is_none());
        assert!(json.get("blogUrl").is_none());
        assert_eq!(json["name"], "Kind of Blue");
    }
}
