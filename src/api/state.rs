use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::Cache,
    error::AppResult,
    services::{
        providers::{CatalogProvider, LastFmProvider, SimilarityProvider, SpotifyCatalog},
        HttpTransport, PlaylistService, RateLimitedClient, RecommendationService,
        RecommendationSettings, ReqwestTransport,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub recommendations: Arc<RecommendationService>,
    pub playlists: PlaylistService,
}

impl AppState {
    /// Wires the Last.fm and Spotify providers over one shared reqwest client
    pub fn new(config: Config, cache: Option<Cache>) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(http_client));

        let graph = LastFmProvider::new(
            RateLimitedClient::new("lastfm", transport.clone(), config.max_retry_attempts),
            &config.lastfm_api_url,
        )?;
        let catalog = SpotifyCatalog::new(
            RateLimitedClient::new("spotify", transport, config.max_retry_attempts),
            &config.spotify_api_url,
        )?;

        tracing::info!(
            similarity = graph.name(),
            catalog = catalog.name(),
            cache = cache.is_some(),
            lastfm_key = config.lastfm_api_key.is_some(),
            "Providers ready"
        );

        Ok(Self::from_parts(config, Arc::new(graph), Arc::new(catalog), cache))
    }

    /// Builds the state around already constructed providers
    pub fn from_parts(
        config: Config,
        graph: Arc<dyn SimilarityProvider>,
        catalog: Arc<dyn CatalogProvider>,
        cache: Option<Cache>,
    ) -> Self {
        let settings = RecommendationSettings {
            resolver_concurrency: config.resolver_concurrency,
            cache_ttl_secs: config.recommendation_cache_ttl_secs,
        };
        let recommendations = RecommendationService::new(graph, catalog.clone(), cache, settings);

        Self {
            config: Arc::new(config),
            playlists: PlaylistService::new(catalog.clone()),
            catalog,
            recommendations: Arc::new(recommendations),
        }
    }
}
