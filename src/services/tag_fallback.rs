use crate::{
    error::{AppError, AppResult},
    models::{RequestContext, TagRecommendations, TrackUri},
    services::{
        resolver::CatalogResolver,
        similarity::SimilarityAdapter,
    },
};

/// Flat catalog query for an artist/tag pair, e.g. "Eminem hip-hop"
pub fn tag_query(artist: &str, tag: &str) -> String {
    format!("{} {}", artist.trim(), tag.trim()).trim().to_string()
}

/// Tag broadening fallback
///
/// Used when the similarity graph has nothing for a seed: the artist's top tags
/// become extra search terms against the catalog.
#[derive(Clone)]
pub struct TagBroadening {
    similarity: SimilarityAdapter,
    resolver: CatalogResolver,
}

impl TagBroadening {
    pub fn new(similarity: SimilarityAdapter, resolver: CatalogResolver) -> Self {
        Self {
            similarity,
            resolver,
        }
    }

    /// One catalog search per top tag, URIs collected in tag order
    ///
    /// Duplicates across tags are kept. Catalog failures propagate.
    pub async fn broaden(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<TrackUri>> {
        let tags = self.similarity.top_tags(artist, ctx).await?;

        let mut uris = Vec::with_capacity(tags.len());
        for tag in &tags {
            let query = tag_query(artist, &tag.name);
            if let Some(uri) = self.resolver.search_uri(&query, ctx).await? {
                uris.push(uri);
            }
        }

        tracing::info!(
            artist = %artist,
            tags = tags.len(),
            resolved = uris.len(),
            "Tag broadening finished"
        );

        Ok(uris)
    }

    /// Standalone fallback entry point
    ///
    /// Probes the similarity graph for the artist alone first; when that yields
    /// tracks they are resolved one by one like regular candidates, otherwise the
    /// tag path runs. A failing similarity lookup is treated as an empty one.
    pub async fn improve_recommendations_with_tags(
        &self,
        artist: &str,
        ctx: &RequestContext,
    ) -> AppResult<TagRecommendations> {
        ctx.lastfm_api_key()?;

        if artist.trim().is_empty() {
            return Err(AppError::InvalidInput("Artist is required".to_string()));
        }

        let similar = match self.similarity.similar_tracks(artist, "", ctx).await {
            Ok(similar) => similar,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e @ AppError::ConfigurationMissing(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(artist = %artist, error = %e, "Similar track lookup failed");
                Vec::new()
            }
        };

        if similar.is_empty() {
            let uris = self.broaden(artist, ctx).await?;
            return Ok(TagRecommendations { uris });
        }

        // Per-candidate misses and failures are skipped, only cancellation aborts
        let mut uris = Vec::with_capacity(similar.len());
        for candidate in &similar {
            if let Some(uri) = self.resolver.resolve(candidate, ctx).await? {
                uris.push(uri);
            }
        }

        Ok(TagRecommendations { uris })
    }
}
