//! Call stream WebSocket handler.
//!
//! Each accepted connection gets its own task running the session event
//! loop, plus a dedicated sender task owning the socket's write half. The
//! session never touches the socket: it pushes [`MessageRoute`] commands
//! onto a channel and the sender task serializes them out. This keeps
//! outbound writes ordered and lets the session side shut down independently
//! of a slow or closed socket.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::core::session::{CallSession, CallState, MessageRoute};
use crate::state::AppState;

/// Interval between turn-buffer polls. Bounds how late after its window a
/// time-based flush can fire.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `GET /call`: upgrade to the call stream protocol.
pub async fn call_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_call(state, socket))
}

async fn handle_call(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::unbounded_channel::<MessageRoute>();

    // Dedicated writer: drains routes until the channel or socket closes.
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            match route {
                MessageRoute::Outgoing(frame) => {
                    let Ok(json) = serde_json::to_string(&frame) else {
                        continue;
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        // Socket is gone; discard whatever else arrives.
                        break;
                    }
                }
                MessageRoute::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut session = CallSession::open(
        state.registry.clone(),
        state.ledger.clone(),
        state.backend.clone(),
        state.config.session_policy(),
        route_tx.clone(),
    )
    .await;

    let mut poll_interval = tokio::time::interval(POLL_INTERVAL);
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = ws_receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => session.on_text(text.as_str()).await,
                    Some(Ok(Message::Binary(data))) => session.on_binary(data).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong are answered by axum
                    Some(Err(e)) => {
                        debug!(call_id = %session.call_id(), error = %e, "socket error");
                        break;
                    }
                }
                // A stop/call_end frame ends the call; close our side too.
                if session.state() == CallState::Ended {
                    let _ = route_tx.send(MessageRoute::Close);
                    break;
                }
            }
            _ = poll_interval.tick() => {
                session.poll().await;
            }
        }
    }

    session.on_disconnect().await;
    drop(route_tx);
    let _ = sender_task.await;
    state.release_connection();
}
