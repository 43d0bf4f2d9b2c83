/// Upstream data providers
///
/// The similarity graph (Last.fm) and the music catalog (Spotify). Every method
/// takes the request context, which carries the credentials and the
/// cancellation token handed to the rate-limited client.
use serde_json::Value;

use crate::{
    error::AppResult,
    models::{
        spotify::{CatalogArtist, CatalogTrack, SavedPlaylist},
        RequestContext, SimilarityCandidate, Tag, TrackUri,
    },
};

pub mod lastfm;
pub mod spotify;

pub use lastfm::LastFmProvider;
pub use spotify::SpotifyCatalog;

/// Trait for similarity graph providers
///
/// Malformed or absent payload fields yield empty lists. Non-2xx answers are
/// errors; callers decide whether they are fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Tracks similar to `artist` - `track`, in source relevance order
    async fn similar_tracks(
        &self,
        artist: &str,
        track: &str,
        ctx: &RequestContext,
    ) -> AppResult<Vec<SimilarityCandidate>>;

    /// Artist names similar to `artist`, in source relevance order
    async fn similar_artists(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<String>>;

    /// Top descriptive tags for `artist`, in source relevance order
    async fn top_tags(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<Tag>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Trait for music catalog providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Free-text track search
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        ctx: &RequestContext,
    ) -> AppResult<Vec<CatalogTrack>>;

    /// Combined track and artist search, passed through untouched
    async fn search(&self, query: &str, limit: u32, ctx: &RequestContext) -> AppResult<Value>;

    /// The user's medium-term top tracks
    async fn user_top_tracks(&self, ctx: &RequestContext) -> AppResult<Vec<CatalogTrack>>;

    async fn track(&self, id: &str, ctx: &RequestContext) -> AppResult<Option<CatalogTrack>>;

    async fn artist(&self, id: &str, ctx: &RequestContext) -> AppResult<Option<CatalogArtist>>;

    /// Full track objects for up to 50 ids; unknown ids are dropped
    async fn tracks(&self, ids: &[String], ctx: &RequestContext) -> AppResult<Vec<Value>>;

    /// Profile of the user owning the access token
    async fn current_user(&self, ctx: &RequestContext) -> AppResult<Value>;

    /// Creates a private playlist and fills it with `uris`
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        uris: &[TrackUri],
        ctx: &RequestContext,
    ) -> AppResult<SavedPlaylist>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
