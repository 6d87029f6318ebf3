//! Server startup tests.
//!
//! Verify that application state, routing, and the connection-limit
//! middleware come up correctly from configuration.

use std::sync::Arc;

use axum::{body::Body, http::Request, middleware};
use tower::util::ServiceExt;

use voicebridge::core::inference::{InferenceBackend, InferenceOutcome, InferenceRequest};
use voicebridge::core::ledger::MemoryLedger;
use voicebridge::middleware::connection_limit_middleware;
use voicebridge::{AppState, ServerConfig, routes};

struct NullBackend;

#[async_trait::async_trait]
impl InferenceBackend for NullBackend {
    async fn respond(&self, _request: InferenceRequest) -> InferenceOutcome {
        InferenceOutcome::degraded("test backend")
    }
}

fn test_state(config: ServerConfig) -> Arc<AppState> {
    AppState::with_collaborators(config, Arc::new(MemoryLedger::new()), Arc::new(NullBackend))
}

/// Boot from a minimal on-disk configuration: the data directory is created
/// and the health check answers.
#[tokio::test]
async fn test_minimal_config_boot() {
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.data_dir = data_dir.path().join("calls");

    let app_state = AppState::new(config).await.expect("state should build");
    assert!(data_dir.path().join("calls").is_dir());

    let app = routes::create_http_router().with_state(app_state);
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn test_health_check_reports_service_identity() {
    let app = routes::create_http_router().with_state(test_state(ServerConfig::default()));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "voicebridge");
    assert_eq!(body["active_calls"], 0);
}

/// The provider webhook answers with the advertised stream URL.
#[tokio::test]
async fn test_incoming_call_webhook_returns_stream_url() {
    let mut config = ServerConfig::default();
    config.public_url = Some("https://bridge.example.com".to_string());
    let app = routes::create_http_router().with_state(test_state(config));

    let request = Request::builder()
        .method("POST")
        .uri("/call/incoming")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"CallSid":"CA123","From":"+15550100"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["stream_url"], "wss://bridge.example.com/call");
}

/// Works without a body too; the metadata is optional.
#[tokio::test]
async fn test_incoming_call_webhook_without_body() {
    let app = routes::create_http_router().with_state(test_state(ServerConfig::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/call/incoming")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

/// The call stream route exists and answers upgrade requests.
#[tokio::test]
async fn test_call_route_setup() {
    let app = routes::create_call_router().with_state(test_state(ServerConfig::default()));

    let request = Request::builder()
        .uri("/call")
        .header("upgrade", "websocket")
        .header("connection", "upgrade")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("sec-websocket-version", "13")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_ne!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

/// A full connection table turns new upgrade requests away with 503.
#[tokio::test]
async fn test_connection_limit_rejects_when_full() {
    let mut config = ServerConfig::default();
    config.max_websocket_connections = Some(0);
    let state = test_state(config);

    let app = routes::create_call_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            connection_limit_middleware,
        ))
        .with_state(state);

    let request = Request::builder()
        .uri("/call")
        .header("upgrade", "websocket")
        .header("connection", "upgrade")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("sec-websocket-version", "13")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.status(),
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    );
}

/// Plain HTTP requests pass the connection-limit middleware untouched.
#[tokio::test]
async fn test_connection_limit_ignores_plain_http() {
    let mut config = ServerConfig::default();
    config.max_websocket_connections = Some(0);
    let state = test_state(config);

    let app = routes::create_http_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            connection_limit_middleware,
        ))
        .with_state(state);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn test_address_and_default_stream_url() {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 4242;

    assert_eq!(config.address(), "127.0.0.1:4242");
    assert_eq!(config.stream_url(), "ws://127.0.0.1:4242/call");
}

#[tokio::test]
async fn test_concurrent_app_state_creation() {
    let tasks: Vec<_> = (0..5)
        .map(|_| {
            tokio::spawn(async move {
                let data_dir = tempfile::tempdir().unwrap();
                let mut config = ServerConfig::default();
                config.data_dir = data_dir.path().to_path_buf();
                AppState::new(config).await.expect("state should build");
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task should complete");
    }
}
