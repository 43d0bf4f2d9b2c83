// ============================================================================
// Last.fm API Types
// ============================================================================
//
// Last.fm collapses single-element lists into a bare object and omits lists
// entirely when nothing matches, so every list goes through `one_or_many` and
// entries that fail to parse are skipped.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use super::{SimilarityCandidate, Tag};

/// Response from `track.getsimilar`
#[derive(Debug, Default, Deserialize)]
pub struct SimilarTracksResponse {
    #[serde(default)]
    pub similartracks: Option<SimilarTracks>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarTracks {
    #[serde(default, deserialize_with = "one_or_many")]
    pub track: Vec<LastFmTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastFmTrack {
    pub name: String,
    #[serde(default)]
    pub artist: Option<LastFmArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastFmArtistRef {
    pub name: String,
}

impl From<LastFmTrack> for SimilarityCandidate {
    fn from(track: LastFmTrack) -> Self {
        SimilarityCandidate {
            artist_name: track.artist.map(|a| a.name).unwrap_or_default(),
            track_name: track.name,
        }
    }
}

/// Response from `artist.getsimilar`
#[derive(Debug, Default, Deserialize)]
pub struct SimilarArtistsResponse {
    #[serde(default)]
    pub similarartists: Option<SimilarArtists>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarArtists {
    #[serde(default, deserialize_with = "one_or_many")]
    pub artist: Vec<LastFmArtistRef>,
}

/// Response from `artist.gettoptags`
#[derive(Debug, Default, Deserialize)]
pub struct TopTagsResponse {
    #[serde(default)]
    pub toptags: Option<TopTags>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopTags {
    #[serde(default, deserialize_with = "one_or_many")]
    pub tag: Vec<LastFmTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastFmTag {
    pub name: String,
}

impl From<LastFmTag> for Tag {
    fn from(tag: LastFmTag) -> Self {
        Tag { name: tag.name }
    }
}

/// Error body Last.fm returns alongside (or instead of) a failing status
#[derive(Debug, Deserialize)]
pub struct LastFmErrorBody {
    pub error: u32,
    #[serde(default)]
    pub message: String,
}

impl LastFmErrorBody {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .collect())
}
