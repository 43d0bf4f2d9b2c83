use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{error::AppError, models::RequestContext};

/// Optional header naming the catalog user that owns new playlists
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller credentials taken from the request headers
///
/// A missing or malformed `Authorization: Bearer` header rejects the request
/// with 401 before the handler runs.
#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let access_token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Ok(Self {
            access_token,
            user_id,
        })
    }
}

impl Credentials {
    /// Per-request context plus the guard that cancels it
    ///
    /// Dropping the guard cancels every upstream call still running for this
    /// request. Handlers hold it for their whole body.
    pub fn into_context(self, lastfm_api_key: Option<String>) -> (Arc<RequestContext>, DropGuard) {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let ctx = RequestContext::new(self.access_token, self.user_id, lastfm_api_key, cancel);
        (Arc::new(ctx), guard)
    }
}

fn bearer_token(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}
