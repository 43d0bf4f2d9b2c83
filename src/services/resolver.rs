use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{RequestContext, SimilarityCandidate, TrackUri},
    services::{fan_out::fan_out, providers::CatalogProvider},
};

/// Free-text search query for a candidate: track first, artist second
pub fn candidate_query(artist: &str, track: &str) -> String {
    format!("{} {}", track.trim(), artist.trim())
        .trim()
        .to_string()
}

/// Maps free-text (artist, track) pairs to catalog track URIs
#[derive(Clone)]
pub struct CatalogResolver {
    catalog: Arc<dyn CatalogProvider>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { catalog }
    }

    /// First catalog hit for a flat text query
    ///
    /// Search errors propagate; use [`CatalogResolver::resolve`] for the
    /// miss-tolerant variant.
    pub async fn search_uri(&self, query: &str, ctx: &RequestContext) -> AppResult<Option<TrackUri>> {
        let tracks = self.catalog.search_tracks(query, 1, ctx).await?;
        Ok(tracks.into_iter().next().and_then(|track| track.track_uri()))
    }

    /// Best-effort resolution of one candidate
    ///
    /// Returns `Ok(None)` on zero hits or on any search failure; only
    /// cancellation is reported as an error.
    pub async fn resolve(
        &self,
        candidate: &SimilarityCandidate,
        ctx: &RequestContext,
    ) -> AppResult<Option<TrackUri>> {
        let query = candidate_query(&candidate.artist_name, &candidate.track_name);
        if query.is_empty() {
            return Ok(None);
        }

        match self.search_uri(&query, ctx).await {
            Ok(uri) => {
                if uri.is_none() {
                    tracing::debug!(query = %query, "No catalog match");
                }
                Ok(uri)
            }
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                tracing::debug!(query = %query, error = %e, "Candidate resolution failed");
                Ok(None)
            }
        }
    }

    /// Resolves every candidate with at most `concurrency` searches in flight
    ///
    /// The output is aligned with `candidates`: entry `i` is the match for
    /// candidate `i`.
    pub async fn resolve_all(
        &self,
        candidates: &[SimilarityCandidate],
        concurrency: usize,
        ctx: Arc<RequestContext>,
    ) -> AppResult<Vec<Option<TrackUri>>> {
        let results = fan_out(candidates.to_vec(), concurrency, |candidate| {
            let resolver = self.clone();
            let ctx = ctx.clone();
            async move { resolver.resolve(&candidate, &ctx).await }
        })
        .await;

        let mut resolved = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(Ok(uri)) => resolved.push(uri),
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, "Resolver task join error");
                    resolved.push(None);
                }
            }
        }

        let hits = resolved.iter().filter(|uri| uri.is_some()).count();
        tracing::info!(
            candidates = candidates.len(),
            resolved = hits,
            "Candidate resolution finished"
        );

        Ok(resolved)
    }
}
