/// Last.fm similarity graph provider
///
/// API Flow (all GET on the single `2.0/` endpoint, selected by `method`):
/// 1. track.getsimilar   → similartracks.track[]
/// 2. artist.getsimilar  → similarartists.artist[]
/// 3. artist.gettoptags  → toptags.tag[]
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{
        lastfm::{LastFmErrorBody, SimilarArtistsResponse, SimilarTracksResponse, TopTagsResponse},
        RequestContext, SimilarityCandidate, Tag,
    },
    services::{
        providers::SimilarityProvider,
        remote::{RateLimitedClient, RemoteRequest},
    },
};

#[derive(Clone)]
pub struct LastFmProvider {
    client: RateLimitedClient,
    api_url: Url,
}

impl LastFmProvider {
    pub fn new(client: RateLimitedClient, api_url: &str) -> AppResult<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| AppError::Internal(format!("Invalid Last.fm API URL {}: {}", api_url, e)))?;
        Ok(Self { client, api_url })
    }

    /// Builds a `method` call; fails before any I/O when the API key is missing
    fn method_request(
        &self,
        method: &str,
        params: &[(&str, &str)],
        ctx: &RequestContext,
    ) -> AppResult<RemoteRequest> {
        let api_key = ctx.lastfm_api_key()?;

        let mut request = RemoteRequest::get(self.api_url.clone()).query("method", method);
        for (key, value) in params {
            request = request.query(key, *value);
        }

        Ok(request.query("api_key", api_key).query("format", "json"))
    }

    /// Runs a method call and decodes it, degrading odd payloads to `T::default()`
    async fn fetch<T>(&self, method: &str, params: &[(&str, &str)], ctx: &RequestContext) -> AppResult<T>
    where
        T: DeserializeOwned + Default + Send,
    {
        let request = self.method_request(method, params, ctx)?;
        let Some(value) = self.client.call(&request, &ctx.cancel).await? else {
            return Ok(T::default());
        };

        log_error_body(method, &value);

        Ok(serde_json::from_value::<T>(value).unwrap_or_else(|e| {
            tracing::warn!(method, error = %e, "Unexpected Last.fm payload shape");
            T::default()
        }))
    }
}

fn log_error_body(method: &str, value: &Value) {
    if let Some(error) = LastFmErrorBody::from_value(value) {
        tracing::debug!(
            method,
            code = error.error,
            message = %error.message,
            "Last.fm returned an error payload"
        );
    }
}

#[async_trait::async_trait]
impl SimilarityProvider for LastFmProvider {
    async fn similar_tracks(
        &self,
        artist: &str,
        track: &str,
        ctx: &RequestContext,
    ) -> AppResult<Vec<SimilarityCandidate>> {
        let response: SimilarTracksResponse = self
            .fetch("track.getsimilar", &[("artist", artist), ("track", track)], ctx)
            .await?;

        let candidates: Vec<SimilarityCandidate> = response
            .similartracks
            .map(|s| s.track)
            .unwrap_or_default()
            .into_iter()
            .map(SimilarityCandidate::from)
            .collect();

        tracing::debug!(
            artist = %artist,
            track = %track,
            results = candidates.len(),
            provider = "lastfm",
            "Similar tracks fetched"
        );

        Ok(candidates)
    }

    async fn similar_artists(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<String>> {
        let response: SimilarArtistsResponse = self
            .fetch("artist.getsimilar", &[("artist", artist)], ctx)
            .await?;

        Ok(response
            .similarartists
            .map(|s| s.artist)
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.name)
            .filter(|name| !name.trim().is_empty())
            .collect())
    }

    async fn top_tags(&self, artist: &str, ctx: &RequestContext) -> AppResult<Vec<Tag>> {
        let response: TopTagsResponse = self
            .fetch("artist.gettoptags", &[("artist", artist)], ctx)
            .await?;

        Ok(response
            .toptags
            .map(|t| t.tag)
            .unwrap_or_default()
            .into_iter()
            .map(Tag::from)
            .collect())
    }

    fn name(&self) -> &'static str {
        "lastfm"
    }
}
