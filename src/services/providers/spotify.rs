/// Spotify Web API catalog provider
///
/// Every call is bearer-authorized with the request's access token and goes
/// through the rate-limited client, so 429 backoff applies uniformly.
use reqwest::Url;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{
        spotify::{
            CatalogArtist, CatalogTrack, Paging, PlaylistResponse, SavedPlaylist,
            SeveralTracksResponse, TrackSearchResponse,
        },
        RequestContext, TrackUri,
    },
    services::{
        providers::CatalogProvider,
        remote::{RateLimitedClient, RemoteRequest},
    },
};

/// Most ids `/tracks` accepts in one call
pub const MAX_TRACK_IDS: usize = 50;
/// Most URIs `/playlists/{id}/tracks` accepts in one call
pub const MAX_PLAYLIST_ADD: usize = 100;
const TOP_TRACKS_LIMIT: &str = "50";
const TOP_TRACKS_TIME_RANGE: &str = "medium_term";

#[derive(Clone)]
pub struct SpotifyCatalog {
    client: RateLimitedClient,
    api_url: Url,
}

impl SpotifyCatalog {
    pub fn new(client: RateLimitedClient, api_url: &str) -> AppResult<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| AppError::Internal(format!("Invalid Spotify API URL {}: {}", api_url, e)))?;
        if api_url.cannot_be_a_base() {
            return Err(AppError::Internal(format!(
                "Spotify API URL {} cannot be a base",
                api_url
            )));
        }
        Ok(Self { client, api_url })
    }

    /// Appends percent-encoded path segments to the API base
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Spotify API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, segments: &[&str], ctx: &RequestContext) -> AppResult<RemoteRequest> {
        Ok(RemoteRequest::get(self.endpoint(segments)?).bearer(&ctx.access_token))
    }

    fn post(&self, segments: &[&str], body: Value, ctx: &RequestContext) -> AppResult<RemoteRequest> {
        Ok(RemoteRequest::post(self.endpoint(segments)?)
            .bearer(&ctx.access_token)
            .json(body))
    }

    async fn call(&self, request: RemoteRequest, ctx: &RequestContext) -> AppResult<Option<Value>> {
        self.client.call(&request, &ctx.cancel).await
    }
}

#[async_trait::async_trait]
impl CatalogProvider for SpotifyCatalog {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        ctx: &RequestContext,
    ) -> AppResult<Vec<CatalogTrack>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let request = self
            .get(&["search"], ctx)?
            .query("q", query)
            .query("type", "track")
            .query("limit", limit.to_string());

        let response: TrackSearchResponse = match self.call(request, ctx).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => TrackSearchResponse::default(),
        };

        let tracks: Vec<CatalogTrack> = response
            .tracks
            .map(Paging::parse_items)
            .unwrap_or_default();

        tracing::debug!(
            query = %query,
            results = tracks.len(),
            provider = "spotify",
            "Track search completed"
        );

        Ok(tracks)
    }

    async fn search(&self, query: &str, limit: u32, ctx: &RequestContext) -> AppResult<Value> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query is required".to_string()));
        }

        let request = self
            .get(&["search"], ctx)?
            .query("q", query)
            .query("type", "track,artist")
            .query("limit", limit.to_string());

        Ok(self
            .call(request, ctx)
            .await?
            .unwrap_or_else(|| json!({ "tracks": { "items": [] }, "artists": { "items": [] } })))
    }

    async fn user_top_tracks(&self, ctx: &RequestContext) -> AppResult<Vec<CatalogTrack>> {
        let request = self
            .get(&["me", "top", "tracks"], ctx)?
            .query("time_range", TOP_TRACKS_TIME_RANGE)
            .query("limit", TOP_TRACKS_LIMIT);

        let paging: Paging = match self.call(request, ctx).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Paging::default(),
        };

        Ok(paging.parse_items())
    }

    async fn track(&self, id: &str, ctx: &RequestContext) -> AppResult<Option<CatalogTrack>> {
        let request = self.get(&["tracks", id], ctx)?;
        match self.call(request, ctx).await {
            Ok(value) => Ok(value.and_then(|v| serde_json::from_value(v).ok())),
            Err(AppError::Upstream { status: 400 | 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn artist(&self, id: &str, ctx: &RequestContext) -> AppResult<Option<CatalogArtist>> {
        let request = self.get(&["artists", id], ctx)?;
        match self.call(request, ctx).await {
            Ok(value) => Ok(value.and_then(|v| serde_json::from_value(v).ok())),
            Err(AppError::Upstream { status: 400 | 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn tracks(&self, ids: &[String], ctx: &RequestContext) -> AppResult<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_csv = ids
            .iter()
            .take(MAX_TRACK_IDS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let request = self.get(&["tracks"], ctx)?.query("ids", ids_csv);

        let response: SeveralTracksResponse = match self.call(request, ctx).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => SeveralTracksResponse::default(),
        };

        Ok(response
            .tracks
            .into_iter()
            .filter(|track| !track.is_null())
            .collect())
    }

    async fn current_user(&self, ctx: &RequestContext) -> AppResult<Value> {
        let request = self.get(&["me"], ctx)?;
        self.call(request, ctx)
            .await?
            .ok_or_else(|| AppError::ExternalApi("Spotify returned an empty profile".to_string()))
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        uris: &[TrackUri],
        ctx: &RequestContext,
    ) -> AppResult<SavedPlaylist> {
        let request = self.post(
            &["users", user_id, "playlists"],
            json!({
                "name": name,
                "description": description,
                "public": false,
            }),
            ctx,
        )?;

        let value = self.call(request, ctx).await?.ok_or_else(|| {
            AppError::ExternalApi("Spotify returned no playlist object".to_string())
        })?;
        let playlist: PlaylistResponse = serde_json::from_value(value)
            .map_err(|e| AppError::ExternalApi(format!("Failed to parse playlist: {}", e)))?;

        for chunk in uris.chunks(MAX_PLAYLIST_ADD) {
            let batch: Vec<&str> = chunk.iter().map(TrackUri::as_str).collect();
            let request = self.post(
                &["playlists", playlist.id.as_str(), "tracks"],
                json!({ "uris": batch }),
                ctx,
            )?;
            self.call(request, ctx).await?;
        }

        tracing::info!(
            playlist_id = %playlist.id,
            tracks = uris.len(),
            provider = "spotify",
            "Playlist created"
        );

        Ok(SavedPlaylist {
            playlist_id: playlist.id,
            playlist_url: playlist.external_urls.spotify,
            tracks_added: uris.len(),
        })
    }

    fn name(&self) -> &'static str {
        "spotify"
    }
}
