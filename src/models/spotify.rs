// ============================================================================
// Spotify Web API Types
// ============================================================================

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{SimilarityCandidate, TrackUri};

/// Track object as returned by search, `/tracks/{id}` and `/me/top/tracks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtistRef>,
}

impl CatalogTrack {
    pub fn track_uri(&self) -> Option<TrackUri> {
        TrackUri::parse(&self.uri)
    }

    /// Name of the first credited artist, empty when none is listed
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(|artist| artist.name.as_str())
            .unwrap_or_default()
    }
}

impl From<CatalogTrack> for SimilarityCandidate {
    fn from(track: CatalogTrack) -> Self {
        SimilarityCandidate {
            artist_name: track.primary_artist().to_string(),
            track_name: track.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Artist object from `/artists/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Paging wrapper; items are kept raw so one bad entry never sinks the page
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub items: Vec<Value>,
}

impl Paging {
    pub fn parse_items<T: DeserializeOwned>(self) -> Vec<T> {
        self.items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<T>(item).ok())
            .collect()
    }
}

/// Response from `/search?type=track`
#[derive(Debug, Default, Deserialize)]
pub struct TrackSearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging>,
}

/// Response from `/tracks?ids=...`
#[derive(Debug, Default, Deserialize)]
pub struct SeveralTracksResponse {
    #[serde(default)]
    pub tracks: Vec<Value>,
}

/// Response from `POST /users/{user_id}/playlists`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistResponse {
    pub id: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// A playlist created in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlaylist {
    pub playlist_id: String,
    pub playlist_url: Option<String>,
    pub tracks_added: usize,
}
