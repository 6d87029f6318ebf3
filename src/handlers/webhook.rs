//! Telephony provider webhook.
//!
//! The provider calls this endpoint when a call comes in; the response is a
//! connection descriptor pointing the provider at this bridge's call stream
//! endpoint. The call itself gets its identifier when the stream connects
//! (reusing the provider id from the `start` frame when one is sent), so this
//! handler only logs the metadata and answers with the stream URL.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

/// Call metadata posted by the telephony provider. Field spellings vary by
/// provider, so aliases cover the common ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingCall {
    #[serde(default, alias = "CallSid", alias = "call_sid")]
    pub call_id: Option<String>,
    #[serde(default, alias = "From", alias = "from")]
    pub caller: Option<String>,
}

/// Connection descriptor returned to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionDescriptor {
    /// WebSocket URL the provider should stream the call's media to.
    pub stream_url: String,
}

/// `POST /call/incoming`: answer a provider webhook with the stream URL.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    body: Option<Json<IncomingCall>>,
) -> Json<ConnectionDescriptor> {
    let metadata = body.map(|Json(b)| b).unwrap_or_default();
    info!(
        call_id = metadata.call_id.as_deref().unwrap_or("-"),
        caller = metadata.caller.as_deref().unwrap_or("-"),
        "incoming call webhook"
    );
    Json(ConnectionDescriptor {
        stream_url: state.config.stream_url(),
    })
}
