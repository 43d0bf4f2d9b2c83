use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// Per-request credentials and cancellation handle
///
/// Owned by one request and never persisted. The access token is the caller's
/// Spotify bearer token; the Last.fm key comes from configuration.
#[derive(Clone)]
pub struct RequestContext {
    pub access_token: String,
    pub user_id: Option<String>,
    lastfm_api_key: Option<String>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(
        access_token: String,
        user_id: Option<String>,
        lastfm_api_key: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            access_token,
            user_id: user_id.filter(|id| !id.trim().is_empty()),
            lastfm_api_key: lastfm_api_key.filter(|key| !key.trim().is_empty()),
            cancel,
        }
    }

    /// Returns the Last.fm API key or fails with `ConfigurationMissing`
    pub fn lastfm_api_key(&self) -> AppResult<&str> {
        self.lastfm_api_key.as_deref().ok_or_else(|| {
            AppError::ConfigurationMissing("Last.fm API key not configured".to_string())
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("lastfm_api_key", &self.lastfm_api_key.as_ref().map(|_| "<redacted>"))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
