use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{spotify::SavedPlaylist, RequestContext, TrackUri},
    services::providers::CatalogProvider,
};

/// Tracks hydrated for display per recommendation response
pub const MAX_HYDRATED_TRACKS: usize = 50;

/// Turns recommendation URIs into displayable tracks and saved playlists
#[derive(Clone)]
pub struct PlaylistService {
    catalog: Arc<dyn CatalogProvider>,
}

impl PlaylistService {
    pub fn new(catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { catalog }
    }

    /// Full catalog track objects for the first 50 URIs, in URI order
    pub async fn hydrate_tracks(&self, uris: &[TrackUri], ctx: &RequestContext) -> AppResult<Vec<Value>> {
        let ids: Vec<String> = uris
            .iter()
            .take(MAX_HYDRATED_TRACKS)
            .map(|uri| uri.id().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.catalog.tracks(&ids, ctx).await
    }

    /// Creates a private playlist holding `uris`
    ///
    /// The owner is the user id carried by the request, or the profile behind
    /// the access token when none was given.
    pub async fn save_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        uris: &[TrackUri],
        ctx: &RequestContext,
    ) -> AppResult<SavedPlaylist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Playlist name is required".to_string()));
        }
        if uris.is_empty() {
            return Err(AppError::InvalidInput(
                "A playlist needs at least one track".to_string(),
            ));
        }

        let user_id = match ctx.user_id.as_deref() {
            Some(id) => id.to_string(),
            None => self.current_user_id(ctx).await?,
        };

        let description = match description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => description.to_string(),
            None => default_description(),
        };

        let saved = self
            .catalog
            .create_playlist(&user_id, name, &description, uris, ctx)
            .await?;

        tracing::info!(
            playlist_id = %saved.playlist_id,
            tracks = saved.tracks_added,
            "Playlist saved"
        );

        Ok(saved)
    }

    async fn current_user_id(&self, ctx: &RequestContext) -> AppResult<String> {
        let profile = self.catalog.current_user(ctx).await?;
        profile
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::ExternalApi("Spotify profile has no user id".to_string()))
    }
}

fn default_description() -> String {
    format!("Seedmix recommendations, {}", Utc::now().format("%Y-%m-%d"))
}
