//! Connection limit middleware for call connections.
//!
//! Enforces the configured global maximum of concurrent call WebSocket
//! connections. A slot is acquired here before the upgrade proceeds and is
//! released by the call handler when its socket task finishes.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::AppState;

/// Middleware that enforces the global connection limit.
///
/// Only applies to WebSocket upgrade requests (detected by the Upgrade
/// header); everything else passes through without a limit check. Returns
/// 503 Service Unavailable when the server is at capacity.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_connection() {
        Ok(()) => {
            // The slot is released by the call handler's socket task.
            next.run(request).await
        }
        Err(_) => {
            tracing::warn!("rejecting connection: global limit reached");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}
