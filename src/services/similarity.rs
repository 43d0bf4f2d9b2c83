use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{RequestContext, SimilarityCandidate, Tag},
    services::providers::{CatalogProvider, SimilarityProvider},
};

/// Upper bound on any candidate list handed to the resolver
pub const MAX_CANDIDATES: usize = 30;
/// Tracks fetched per similar artist when expanding an artist seed
pub const ARTIST_TOP_TRACKS_LIMIT: u32 = 10;
/// Tags used for broadening
pub const MAX_TAGS: usize = 5;

/// Similarity source adapter
///
/// Wraps the similarity graph and the catalog behind the candidate-level
/// operations the orchestrator needs, and enforces the list caps.
#[derive(Clone)]
pub struct SimilarityAdapter {
    graph: Arc<dyn SimilarityProvider>,
    catalog: Arc<dyn CatalogProvider>,
}

impl SimilarityAdapter {
    pub fn new(graph: Arc<dyn SimilarityProvider>, catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { graph, catalog }
    }

    pub async fn similar_tracks(
        &self,
        artist: &str,
        track: &str,
        ctx: &RequestContext,
    ) -> AppResult<Vec<SimilarityCandidate>> {
        let mut candidates = self.graph.similar_tracks(artist, track, ctx).await?;
        cap("similar_tracks", &mut candidates, MAX_CANDIDATES);
        Ok(candidates)
    }

    pub async fn similar_artists(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<String>> {
        let mut artists = self.graph.similar_artists(artist, ctx).await?;
        cap("similar_artists", &mut artists, MAX_CANDIDATES);
        Ok(artists)
    }

    /// Expands an artist into concrete tracks via catalog search
    ///
    /// Candidates carry the queried artist name, not the catalog's credit, so the
    /// resolver searches for the same artist again. Search failures other than
    /// cancellation yield an empty list.
    pub async fn top_tracks_for_artist(
        &self,
        artist: &str,
        ctx: &RequestContext,
    ) -> AppResult<Vec<SimilarityCandidate>> {
        match self
            .catalog
            .search_tracks(artist, ARTIST_TOP_TRACKS_LIMIT, ctx)
            .await
        {
            Ok(tracks) => Ok(tracks
                .into_iter()
                .map(|track| SimilarityCandidate::new(artist, track.name))
                .collect()),
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(artist = %artist, error = %e, "Artist top tracks lookup failed");
                Ok(Vec::new())
            }
        }
    }

    /// The user's own top tracks, as (artist, track) pairs
    pub async fn user_top_tracks(&self, ctx: &RequestContext) -> AppResult<Vec<SimilarityCandidate>> {
        let tracks = self.catalog.user_top_tracks(ctx).await?;
        Ok(tracks.into_iter().map(SimilarityCandidate::from).collect())
    }

    pub async fn top_tags(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .graph
            .top_tags(artist, ctx)
            .await?
            .into_iter()
            .filter(|tag| !tag.name.trim().is_empty())
            .collect();
        cap("top_tags", &mut tags, MAX_TAGS);
        Ok(tags)
    }
}

fn cap<T>(source: &'static str, items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        tracing::debug!(source, received = items.len(), limit, "Truncating upstream list");
        items.truncate(limit);
    }
}
