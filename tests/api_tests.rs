use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use seedmix_api::{
    api::{create_router, AppState},
    config::Config,
    error::AppResult,
    services::{
        providers::{LastFmProvider, SpotifyCatalog},
        remote::{HttpTransport, RateLimitedClient, RemoteRequest, RemoteResponse},
    },
};

const LASTFM_URL: &str = "http://lastfm.test/2.0/";
const SPOTIFY_URL: &str = "http://spotify.test/v1";

/// Canned Last.fm and Spotify answers, with a log of every upstream call
#[derive(Default)]
struct FakeUpstream {
    calls: Mutex<Vec<String>>,
    throttle_first_search: AtomicBool,
}

impl FakeUpstream {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lastfm(&self, request: &RemoteRequest) -> Value {
        let artist = request.query_value("artist").unwrap_or_default();
        match request.query_value("method").unwrap_or_default() {
            "track.getsimilar" if artist == "Eminem" => json!({
                "similartracks": { "track": [
                    { "name": "In Da Club", "artist": { "name": "50 Cent" } },
                    { "name": "Still D.R.E.", "artist": { "name": "Dr. Dre" } },
                    { "name": "In Da Club", "artist": { "name": "50 Cent" } }
                ]}
            }),
            "track.getsimilar" => json!({ "similartracks": { "track": [] } }),
            "artist.gettoptags" => json!({
                "toptags": { "tag": [{ "name": "rap" }, { "name": "detroit" }] }
            }),
            _ => json!({ "error": 6, "message": "Artist not found" }),
        }
    }

    fn spotify(&self, request: &RemoteRequest) -> RemoteResponse {
        let path = request.url.path().to_string();
        match path.as_str() {
            "/v1/search" => {
                if self.throttle_first_search.swap(false, Ordering::SeqCst) {
                    return RemoteResponse::rate_limited(Some(1));
                }
                let uri = match request.query_value("q").unwrap_or_default() {
                    "In Da Club 50 Cent" => Some("spotify:track:X"),
                    "Still D.R.E. Dr. Dre" => Some("spotify:track:Y"),
                    "Obscure rap" => Some("spotify:track:Z"),
                    "Obscure detroit" => Some("spotify:track:Z"),
                    _ => None,
                };
                let items: Vec<Value> = uri
                    .into_iter()
                    .map(|uri| json!({ "uri": uri, "name": "track", "artists": [] }))
                    .collect();
                ok(json!({ "tracks": { "items": items } }))
            }
            "/v1/me/top/tracks" => ok(json!({ "items": [] })),
            "/v1/tracks" => {
                let tracks: Vec<Value> = request
                    .query_value("ids")
                    .unwrap_or_default()
                    .split(',')
                    .map(|id| json!({ "id": id, "name": format!("Track {}", id) }))
                    .collect();
                ok(json!({ "tracks": tracks }))
            }
            "/v1/me" => ok(json!({ "id": "alice", "display_name": "Alice" })),
            "/v1/users/alice/playlists" => ok(json!({
                "id": "pl1",
                "external_urls": { "spotify": "https://open.spotify.com/playlist/pl1" }
            })),
            "/v1/playlists/pl1/tracks" => ok(json!({ "snapshot_id": "snap" })),
            _ => RemoteResponse::status(404),
        }
    }
}

fn ok(body: Value) -> RemoteResponse {
    RemoteResponse::ok(body.to_string())
}

#[async_trait::async_trait]
impl HttpTransport for FakeUpstream {
    async fn execute(&self, request: &RemoteRequest) -> AppResult<RemoteResponse> {
        let host = request.url.host_str().unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}{}", request.method, host, request.url.path()));

        if host == "lastfm.test" {
            Ok(ok(self.lastfm(request)))
        } else {
            Ok(self.spotify(request))
        }
    }
}

fn config(lastfm_api_key: Option<&str>) -> Config {
    let mut vars = vec![
        ("LASTFM_API_URL".to_string(), LASTFM_URL.to_string()),
        ("SPOTIFY_API_URL".to_string(), SPOTIFY_URL.to_string()),
    ];
    if let Some(key) = lastfm_api_key {
        vars.push(("LASTFM_API_KEY".to_string(), key.to_string()));
    }
    envy::from_iter(vars).unwrap()
}

fn create_test_app(upstream: Arc<FakeUpstream>, lastfm_api_key: Option<&str>) -> Router {
    let config = config(lastfm_api_key);
    let transport: Arc<dyn HttpTransport> = upstream;

    let graph = LastFmProvider::new(
        RateLimitedClient::new("lastfm", transport.clone(), config.max_retry_attempts),
        &config.lastfm_api_url,
    )
    .unwrap();
    let catalog = SpotifyCatalog::new(
        RateLimitedClient::new("spotify", transport, config.max_retry_attempts),
        &config.spotify_api_url,
    )
    .unwrap();

    create_router(AppState::from_parts(
        config,
        Arc::new(graph),
        Arc::new(catalog),
        None,
    ))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer test-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::new(FakeUpstream::default()), Some("key"));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(Arc::new(FakeUpstream::default()), Some("key"));
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "frontend-7")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "frontend-7");
}

#[tokio::test]
async fn test_missing_bearer_token_is_rejected() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream.clone(), Some("key"));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/recommendations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "seedId": "x", "seedType": "track" }).to_string()))
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("bearer"));
    assert!(upstream.calls().is_empty());
}

#[tokio::test]
async fn test_track_seed_recommendations() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream.clone(), Some("key"));

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/recommendations",
            json!({
                "seedId": "7MJQ9Nfxzh8LPZ9e9u68Fq",
                "seedType": "track",
                "seedName": "Lose Yourself",
                "artistName": "Eminem"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackUris"], json!(["spotify:track:X", "spotify:track:Y"]));
    assert_eq!(body["usedFallback"], json!(false));
    assert_eq!(body["tracks"].as_array().unwrap().len(), 2);
    assert_eq!(body["tracks"][0]["id"], "X");
}

#[tokio::test]
async fn test_unknown_track_falls_back_to_tags() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream.clone(), Some("key"));

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/recommendations",
            json!({
                "seedId": "obscure-id",
                "seedType": "track",
                "seedName": "Demo",
                "artistName": "Obscure"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackUris"], json!(["spotify:track:Z"]));
    assert_eq!(body["usedFallback"], json!(true));

    let tag_calls = upstream
        .calls()
        .iter()
        .filter(|call| call.starts_with("GET lastfm.test"))
        .count();
    // track.getsimilar followed by a single artist.gettoptags
    assert_eq!(tag_calls, 2);
}

#[tokio::test]
async fn test_missing_lastfm_key_fails_without_upstream_calls() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream.clone(), None);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/recommendations",
            json!({
                "seedId": "x",
                "seedType": "track",
                "seedName": "Stan",
                "artistName": "Eminem"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Last.fm API key not configured");
    assert!(upstream.calls().is_empty());
}

#[tokio::test]
async fn test_tag_recommendations_endpoint() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream, Some("key"));

    let (status, body) = send(
        app,
        post_json("/api/v1/recommendations/tags", json!({ "artist": "Obscure" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uris"], json!(["spotify:track:Z", "spotify:track:Z"]));
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = create_test_app(Arc::new(FakeUpstream::default()), Some("key"));
    let request = Request::builder()
        .uri("/api/v1/search?q=%20")
        .header(header::AUTHORIZATION, "Bearer test-token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_search_survives_rate_limiting() {
    let upstream = Arc::new(FakeUpstream {
        throttle_first_search: AtomicBool::new(true),
        ..FakeUpstream::default()
    });
    let app = create_test_app(upstream.clone(), Some("key"));
    let request = Request::builder()
        .uri("/api/v1/search?q=In%20Da%20Club%2050%20Cent")
        .header(header::AUTHORIZATION, "Bearer test-token")
        .body(Body::empty())
        .unwrap();

    let started = tokio::time::Instant::now();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracks"]["items"][0]["uri"], "spotify:track:X");
    assert!(started.elapsed() >= std::time::Duration::from_secs(2));
    assert_eq!(upstream.calls().len(), 2);
}

#[tokio::test]
async fn test_create_playlist_looks_up_user() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = create_test_app(upstream.clone(), None);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/playlists",
            json!({
                "name": "Seedmix: Lose Yourself",
                "uris": ["spotify:track:X", "spotify:track:Y"]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["playlistId"], "pl1");
    assert_eq!(body["playlistUrl"], "https://open.spotify.com/playlist/pl1");
    assert_eq!(
        upstream.calls(),
        vec![
            "GET spotify.test/v1/me".to_string(),
            "POST spotify.test/v1/users/alice/playlists".to_string(),
            "POST spotify.test/v1/playlists/pl1/tracks".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_create_playlist_rejects_empty_uri() {
    let app = create_test_app(Arc::new(FakeUpstream::default()), None);

    let (status, _) = send(
        app,
        post_json("/api/v1/playlists", json!({ "name": "Mix", "uris": [""] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
