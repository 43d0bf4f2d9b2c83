use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{spotify::SavedPlaylist, Seed, SeedKind, TagRecommendations, TrackUri},
};

use super::{AppState, Credentials};

/// Results per type for the search endpoint
const SEARCH_LIMIT: u32 = 10;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub seed_id: String,
    pub seed_type: SeedKind,
    /// Track title or artist name, depending on `seed_type`
    #[serde(default)]
    pub seed_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
}

impl From<RecommendationRequest> for Seed {
    fn from(request: RecommendationRequest) -> Self {
        Seed {
            kind: request.seed_type,
            id: request.seed_id,
            display_name: request.seed_name.unwrap_or_default(),
            artist_name: request.artist_name,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub tracks: Vec<Value>,
    pub track_uris: Vec<TrackUri>,
    pub familiar_uris: Vec<TrackUri>,
    pub used_fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct TagRecommendationRequest {
    pub artist: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub uris: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Catalog profile of the caller
pub async fn me(State(state): State<AppState>, credentials: Credentials) -> AppResult<Json<Value>> {
    let (ctx, _guard) = credentials.into_context(None);
    let profile = state.catalog.current_user(&ctx).await?;
    Ok(Json(profile))
}

/// Track and artist search used to pick a seed
pub async fn search(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Value>> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query parameter 'q' is required".to_string()));
    }

    let (ctx, _guard) = credentials.into_context(None);
    let results = state.catalog.search(query.trim(), SEARCH_LIMIT, &ctx).await?;
    Ok(Json(results))
}

/// Runs the recommendation pipeline and hydrates the resulting tracks
pub async fn recommend(
    State(state): State<AppState>,
    credentials: Credentials,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let seed = Seed::from(request);
    let (ctx, _guard) = credentials.into_context(state.config.lastfm_api_key.clone());

    let result = state
        .recommendations
        .generate_recommendations(&seed, ctx.clone())
        .await?;
    let tracks = state.playlists.hydrate_tracks(&result.track_uris, &ctx).await?;

    Ok(Json(RecommendationResponse {
        tracks,
        track_uris: result.track_uris,
        familiar_uris: result.familiar_uris,
        used_fallback: result.used_fallback,
    }))
}

/// Tag-based recommendations for a bare artist name
pub async fn improve_with_tags(
    State(state): State<AppState>,
    credentials: Credentials,
    Json(request): Json<TagRecommendationRequest>,
) -> AppResult<Json<TagRecommendations>> {
    let (ctx, _guard) = credentials.into_context(state.config.lastfm_api_key.clone());
    let result = state
        .recommendations
        .improve_recommendations_with_tags(&request.artist, ctx)
        .await?;
    Ok(Json(result))
}

/// Saves a list of track URIs as a new playlist
pub async fn create_playlist(
    State(state): State<AppState>,
    credentials: Credentials,
    Json(request): Json<CreatePlaylistRequest>,
) -> AppResult<(StatusCode, Json<SavedPlaylist>)> {
    let uris = request
        .uris
        .iter()
        .map(|raw| {
            TrackUri::parse(raw)
                .ok_or_else(|| AppError::InvalidInput(format!("Invalid track URI: {:?}", raw)))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let (ctx, _guard) = credentials.into_context(None);
    let saved = state
        .playlists
        .save_playlist(&request.name, request.description.as_deref(), &uris, &ctx)
        .await?;

    Ok((StatusCode::CREATED, Json(saved)))
}
