use reqwest::{header, Client as HttpClient, Method, Url};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// Seconds to assume when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
/// Upper bound on a single `Retry-After` wait
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// A fully described outbound request, replayable on retry
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Looks up a query parameter, mostly for assertions
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw status, rate-limit hint and body of a remote answer
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub retry_after: Option<u64>,
    pub body: String,
}

impl RemoteResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self {
            status: 429,
            retry_after,
            body: String::new(),
        }
    }
}

/// Single-shot HTTP exchange; retry policy lives in [`RateLimitedClient`]
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &RemoteRequest) -> AppResult<RemoteResponse>;
}

/// reqwest-backed transport
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http_client: HttpClient,
}

impl ReqwestTransport {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &RemoteRequest) -> AppResult<RemoteResponse> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .header(header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Ok(RemoteResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// HTTP client that honours upstream rate limiting
///
/// A 429 is retried after `Retry-After + 1` seconds, up to `max_attempts` total
/// attempts. A 204 (or an empty 2xx body) yields `None`. Any other non-2xx is
/// logged and returned as [`AppError::Upstream`] without retrying. Both the
/// exchange and the backoff sleep abort as soon as the request's cancellation
/// token fires.
#[derive(Clone)]
pub struct RateLimitedClient {
    service: &'static str,
    transport: Arc<dyn HttpTransport>,
    max_attempts: u32,
}

impl RateLimitedClient {
    pub fn new(service: &'static str, transport: Arc<dyn HttpTransport>, max_attempts: u32) -> Self {
        Self {
            service,
            transport,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn call(
        &self,
        request: &RemoteRequest,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Value>> {
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            attempt += 1;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                response = self.transport.execute(request) => response?,
            };

            match response.status {
                204 => return Ok(None),
                429 => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            service = self.service,
                            url = %request.url,
                            attempts = attempt,
                            "Rate limit persisted, giving up"
                        );
                        return Err(AppError::RateLimited {
                            service: self.service,
                            attempts: attempt,
                        });
                    }

                    let retry_after = response
                        .retry_after
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                        .min(MAX_RETRY_AFTER_SECS);
                    let wait = Duration::from_secs(retry_after + 1);
                    tracing::info!(
                        service = self.service,
                        url = %request.url,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "Rate limited, backing off"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                status if (200..300).contains(&status) => {
                    if response.body.trim().is_empty() {
                        return Ok(None);
                    }
                    let value = serde_json::from_str(&response.body).map_err(|e| {
                        tracing::error!(
                            service = self.service,
                            error = %e,
                            "Failed to parse upstream response"
                        );
                        AppError::ExternalApi(format!(
                            "Failed to parse {} response: {}",
                            self.service, e
                        ))
                    })?;
                    return Ok(Some(value));
                }
                status => {
                    tracing::error!(
                        service = self.service,
                        url = %request.url,
                        status,
                        body = %response.body,
                        "Upstream request failed"
                    );
                    return Err(AppError::Upstream {
                        service: self.service,
                        status,
                        body: response.body,
                    });
                }
            }
        }
    }
}
