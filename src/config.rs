use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Last.fm API key; requests needing it fail with a configuration error when unset
    #[serde(default)]
    pub lastfm_api_key: Option<String>,

    /// Last.fm API base URL
    #[serde(default = "default_lastfm_api_url")]
    pub lastfm_api_url: String,

    /// Spotify Web API base URL
    #[serde(default = "default_spotify_api_url")]
    pub spotify_api_url: String,

    /// Redis connection URL; result caching is disabled when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on attempts per remote call while being rate limited
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Concurrent catalog lookups per recommendation request
    #[serde(default = "default_resolver_concurrency")]
    pub resolver_concurrency: usize,

    /// Deadline for a whole HTTP request, backoff sleeps included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_recommendation_cache_ttl_secs")]
    pub recommendation_cache_ttl_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_lastfm_api_url() -> String {
    "https://ws.audioscrobbler.com/2.0/".to_string()
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_retry_attempts() -> u32 {
    5
}

fn default_resolver_concurrency() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_recommendation_cache_ttl_secs() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
