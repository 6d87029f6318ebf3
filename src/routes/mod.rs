//! Route construction.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Public HTTP routes: health check and the provider webhook.
///
/// # Endpoints
///
/// - `GET /` - health check
/// - `POST /call/incoming` - telephony webhook, answers with the stream URL
pub fn create_http_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::health_check))
        .route("/call/incoming", post(handlers::webhook::incoming_call))
        .layer(TraceLayer::new_for_http())
}

/// Call stream WebSocket route.
///
/// # Endpoint
///
/// `GET /call` - WebSocket upgrade for a telephony call stream
///
/// # Protocol
///
/// After the upgrade, the provider sends JSON frames tagged by an `event`
/// field (`start`, `media`, `user_speech`, `stop`, `call_end`); the bridge
/// answers with `assistant_audio` or `assistant_text` frames. Non-JSON
/// frames are handled per the configured binary-media policy.
pub fn create_call_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/call", get(handlers::call::call_handler))
        .layer(TraceLayer::new_for_http())
}
