use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Display};

pub mod context;
pub mod lastfm;
pub mod spotify;

pub use context::RequestContext;

/// Whether a recommendation run starts from a track or from an artist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    Track,
    Artist,
}

impl Display for SeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedKind::Track => write!(f, "track"),
            SeedKind::Artist => write!(f, "artist"),
        }
    }
}

/// The user-chosen starting point of a recommendation run
///
/// `display_name` is the track title for track seeds and the artist name for
/// artist seeds. `artist_name` carries the seed's artist; it is also the artist
/// used for tag broadening. Missing names are looked up in the catalog by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    pub kind: SeedKind,
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub artist_name: Option<String>,
}

impl Seed {
    pub fn track(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            kind: SeedKind::Track,
            id: id.into(),
            display_name: title.into(),
            artist_name: Some(artist.into()),
        }
    }

    pub fn artist(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: SeedKind::Artist,
            id: id.into(),
            artist_name: Some(name.clone()),
            display_name: name,
        }
    }
}

/// An unresolved, text-only similarity result
///
/// An empty `track_name` marks an artist-only candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub artist_name: String,
    pub track_name: String,
}

impl SimilarityCandidate {
    pub fn new(artist_name: impl Into<String>, track_name: impl Into<String>) -> Self {
        Self {
            artist_name: artist_name.into(),
            track_name: track_name.into(),
        }
    }
}

/// Opaque catalog track identifier (e.g. "spotify:track:4uLU6hMCjMI75M1A2tKUQC")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackUri(String);

impl TrackUri {
    /// Wraps a raw URI, rejecting the empty sentinel of an unresolved search
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare catalog id, i.e. the last `:`-separated segment
    pub fn id(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl Display for TrackUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive tag from the similarity graph (e.g. "hip-hop")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Final output of a recommendation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// Unique track URIs in order of first resolution
    pub track_uris: Vec<TrackUri>,
    /// Subset of `track_uris` whose artist appears in the user's top tracks
    #[serde(default)]
    pub familiar_uris: Vec<TrackUri>,
    /// True when the tag broadening path produced `track_uris`
    #[serde(default)]
    pub used_fallback: bool,
}

impl RecommendationResult {
    /// Builds a result from resolved URIs, keeping the first occurrence of each
    pub fn from_uris<I>(uris: I) -> Self
    where
        I: IntoIterator<Item = TrackUri>,
    {
        Self {
            track_uris: dedup_uris(uris),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.track_uris.is_empty()
    }
}

/// Output of the standalone tag broadening entry point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagRecommendations {
    pub uris: Vec<TrackUri>,
}

/// Removes duplicate URIs, first occurrence wins
pub fn dedup_uris<I>(uris: I) -> Vec<TrackUri>
where
    I: IntoIterator<Item = TrackUri>,
{
    let mut seen = HashSet::new();
    uris.into_iter()
        .filter(|uri| seen.insert(uri.clone()))
        .collect()
}
