//! Per-call session orchestration.
//!
//! A [`CallSession`] owns everything for one telephony connection: the turn
//! buffer, the lifecycle state machine (connecting, active, ended), and
//! the flush pipeline that takes a completed turn through intent
//! classification, prompt assembly, the inference backend, the ledger, and
//! back out to the caller.
//!
//! Exactly one connection task drives a session, so its methods take `&mut
//! self` and need no internal locking. The turn pipeline is awaited inline
//! from that task, which makes single-flight per call structural: a second
//! flush for the same call cannot start until the first has merged its
//! result. Frames for other calls are handled by other tasks and are never
//! delayed by a slow backend call here.

mod messages;
mod prompt;
mod registry;

pub use messages::{InboundFrame, MessageRoute, OutboundFrame};
pub use prompt::build_system_prompt;
pub use registry::{CallRecord, CallState, SessionRegistry};

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::inference::{InferenceBackend, InferenceRequest, UserInput};
use crate::core::intent;
use crate::core::ledger::{CallLedger, LedgerError, LogEvent, MemoryEntry, MemoryRole, event_kind};
use crate::core::tone::tone_for;
use crate::core::turn::{FlushDecision, Fragment, TurnBuffer, TurnPayload, TurnPolicy};

/// Persona used when no system prompt is configured.
pub const DEFAULT_PERSONA: &str = "You are a friendly, human-sounding receptionist \
     answering phone calls for the business. Keep replies short and natural, \
     as if speaking aloud.";

/// What to do with frames that are not structured JSON events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryMediaPolicy {
    /// Treat them as raw audio fragments and buffer them toward the next turn.
    #[default]
    Buffer,
    /// Discard them.
    Drop,
}

/// Per-session behavior knobs, resolved from configuration at accept time.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub turn_policy: TurnPolicy,
    pub binary_media: BinaryMediaPolicy,
    /// Whether a partially filled buffer is flushed through inference when
    /// the call ends, or discarded with a log event.
    pub flush_on_close: bool,
    /// System-prompt persona.
    pub persona: String,
    /// Format tag attached to audio turns sent to the backend.
    pub audio_input_format: String,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            turn_policy: TurnPolicy::TimeWindow {
                window: std::time::Duration::from_millis(1400),
            },
            binary_media: BinaryMediaPolicy::Buffer,
            flush_on_close: false,
            persona: DEFAULT_PERSONA.to_string(),
            audio_input_format: "wav".to_string(),
        }
    }
}

/// One live call: state machine plus turn pipeline.
pub struct CallSession {
    call_id: String,
    caller: Option<String>,
    state: CallState,
    buffer: TurnBuffer,
    policy: SessionPolicy,
    registry: Arc<SessionRegistry>,
    ledger: Arc<dyn CallLedger>,
    backend: Arc<dyn InferenceBackend>,
    outbound: mpsc::UnboundedSender<MessageRoute>,
    turn_in_flight: bool,
}

impl CallSession {
    /// Register a new call and open its session.
    ///
    /// Emits a `ws_connect` event to the call's log.
    pub async fn open(
        registry: Arc<SessionRegistry>,
        ledger: Arc<dyn CallLedger>,
        backend: Arc<dyn InferenceBackend>,
        policy: SessionPolicy,
        outbound: mpsc::UnboundedSender<MessageRoute>,
    ) -> Self {
        let call_id = registry.register();
        info!(call_id = %call_id, "call session opened");
        let session = Self {
            call_id,
            caller: None,
            state: CallState::Connecting,
            buffer: TurnBuffer::new(policy.turn_policy),
            policy,
            registry,
            ledger,
            backend,
            outbound,
            turn_in_flight: false,
        };
        session
            .log_event(event_kind::WS_CONNECT, json!({}))
            .await;
        session
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Handle one inbound text frame from the socket.
    ///
    /// JSON-looking text that fails to parse is a malformed frame: logged and
    /// dropped without touching session state. Anything else is treated as an
    /// opaque media fragment under the binary-media policy.
    pub async fn on_text(&mut self, raw: &str) {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') {
            match serde_json::from_str::<InboundFrame>(trimmed) {
                Ok(frame) => self.on_inbound(frame).await,
                Err(e) => {
                    debug!(call_id = %self.call_id, error = %e, "malformed frame dropped");
                    self.log_event(
                        event_kind::MALFORMED_FRAME,
                        json!({"error": e.to_string()}),
                    )
                    .await;
                    // Advisory only; the call continues.
                    let _ = self.outbound.send(MessageRoute::Outgoing(OutboundFrame::Error {
                        message: "malformed frame dropped".to_string(),
                    }));
                }
            }
        } else {
            self.on_raw_media(Bytes::copy_from_slice(raw.as_bytes()))
                .await;
        }
    }

    /// Handle one inbound binary frame.
    pub async fn on_binary(&mut self, data: Bytes) {
        self.on_raw_media(data).await;
    }

    /// Handle a parsed structured frame.
    pub async fn on_inbound(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::Start { call_id, caller } => {
                if let Some(provider_id) = call_id.as_deref() {
                    let adopted = self.registry.adopt(&self.call_id, provider_id);
                    if adopted != self.call_id {
                        // Carry records written under the provisional id along,
                        // so the call keeps a single memory and log record.
                        if let Err(e) = self.ledger.rename(&self.call_id, &adopted).await {
                            self.log_ledger_error("record rename", &e);
                        }
                        info!(from = %self.call_id, to = %adopted, "adopted provider call id");
                        self.call_id = adopted;
                    }
                }
                self.caller = caller;
                self.activate(false).await;
            }
            InboundFrame::Media { payload } => {
                self.ensure_active().await;
                // Providers send base64 media; tolerate raw bytes too.
                let data = match BASE64.decode(payload.as_bytes()) {
                    Ok(decoded) => Bytes::from(decoded),
                    Err(_) => Bytes::from(payload.into_bytes()),
                };
                self.push_fragment(Fragment::Audio(data)).await;
            }
            InboundFrame::UserSpeech {
                text,
                is_final,
                emotion,
            } => {
                self.ensure_active().await;
                if let Some(label) = emotion.as_deref() {
                    self.buffer.set_emotion(label);
                }
                self.push_fragment(Fragment::Transcript { text, is_final })
                    .await;
            }
            InboundFrame::Stop => self.end_call("stop").await,
            InboundFrame::CallEnd => self.end_call("call_end").await,
            InboundFrame::Unknown => {
                debug!(call_id = %self.call_id, "unrecognized event ignored");
                self.log_event(event_kind::UNKNOWN_EVENT, json!({})).await;
            }
        }
    }

    /// Periodic tick from the connection task's timer arm. Drives
    /// time-window flushes.
    pub async fn poll(&mut self) {
        if self.state == CallState::Ended {
            return;
        }
        if let FlushDecision::Flush(payload) = self.buffer.poll(Instant::now()) {
            self.run_turn(payload).await;
        }
    }

    /// The socket is gone. Finishes the call if a `stop` frame did not
    /// already, then releases the registry record. Ledger data persists.
    pub async fn on_disconnect(&mut self) {
        self.end_call("disconnect").await;
        self.log_event(event_kind::WS_CLOSE, json!({})).await;
        self.registry.remove(&self.call_id);
        info!(call_id = %self.call_id, "call session closed");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn ensure_active(&mut self) {
        if self.state == CallState::Connecting {
            self.activate(true).await;
        }
    }

    async fn activate(&mut self, lazy: bool) {
        if self.state != CallState::Connecting {
            return;
        }
        self.state = CallState::Active;
        self.registry.set_state(&self.call_id, CallState::Active);
        self.log_event(
            event_kind::CALL_START,
            json!({"caller": self.caller, "lazy": lazy}),
        )
        .await;
    }

    async fn push_fragment(&mut self, fragment: Fragment) {
        if self.state == CallState::Ended {
            return;
        }
        if let FlushDecision::Flush(payload) = self.buffer.push(fragment) {
            self.run_turn(payload).await;
        }
    }

    async fn on_raw_media(&mut self, data: Bytes) {
        match self.policy.binary_media {
            BinaryMediaPolicy::Buffer => {
                self.ensure_active().await;
                self.push_fragment(Fragment::Audio(data)).await;
            }
            BinaryMediaPolicy::Drop => {
                debug!(call_id = %self.call_id, bytes = data.len(), "raw media dropped");
            }
        }
    }

    /// Idempotent transition to `ended`. Pending input is flushed through
    /// inference or discarded per policy; either way it is accounted for in
    /// the event log. The ended state is set first so a flush here merges
    /// and logs its result without emitting to the closing socket.
    async fn end_call(&mut self, reason: &str) {
        if self.state == CallState::Ended {
            return;
        }
        self.state = CallState::Ended;
        self.registry.set_state(&self.call_id, CallState::Ended);

        if let Some(pending) = self.buffer.take_pending() {
            if self.policy.flush_on_close {
                self.run_turn(pending).await;
            } else {
                self.log_event(
                    event_kind::TURN_DISCARDED,
                    json!({
                        "reason": reason,
                        "fragments": pending.audio.len(),
                        "bytes": pending.audio_len(),
                    }),
                )
                .await;
            }
        }

        self.log_event(event_kind::CALL_END, json!({"reason": reason}))
            .await;
    }

    /// The turn pipeline: snapshot memory, classify, pick a tone, build the
    /// prompt, call the backend, merge, emit, log. Runs inline on the connection task, so
    /// at most one pipeline per call is ever in flight.
    async fn run_turn(&mut self, payload: TurnPayload) {
        if self.turn_in_flight {
            // Unreachable from the single connection task; kept observable.
            warn!(call_id = %self.call_id, "turn dropped: one already in flight");
            return;
        }
        self.turn_in_flight = true;

        let TurnPayload {
            audio,
            text,
            emotion,
        } = payload;
        let fragments = audio.len();
        let audio_bytes: usize = audio.iter().map(|chunk| chunk.len()).sum();

        let user = match text {
            Some(text) => UserInput::Text(text),
            None => {
                let mut joined = Vec::with_capacity(audio_bytes);
                for chunk in &audio {
                    joined.extend_from_slice(chunk);
                }
                UserInput::Audio {
                    data: BASE64.encode(&joined),
                    format: self.policy.audio_input_format.clone(),
                }
            }
        };
        let user_text = user.memory_text();
        let intent = intent::classify(&user_text);
        let tone = tone_for(&emotion);

        self.log_event(
            event_kind::TURN_FLUSH,
            json!({
                "fragments": fragments,
                "bytes": audio_bytes,
                "intent": intent,
                "emotion": emotion,
            }),
        )
        .await;

        // Snapshot memory, append the user entry before dispatch so the
        // prompt and the stored conversation always agree.
        let mut memory = match self.ledger.memory(&self.call_id).await {
            Ok(entries) => entries,
            Err(e) => {
                self.log_ledger_error("memory read", &e);
                Vec::new()
            }
        };
        let prior = memory.clone();
        memory.push(MemoryEntry::now(MemoryRole::User, &user_text));
        self.store_memory(&memory).await;

        let request = InferenceRequest {
            system_prompt: build_system_prompt(&self.policy.persona, tone, intent),
            memory: prior,
            user,
        };
        let outcome = self.backend.respond(request).await;

        if let Some(cause) = &outcome.failure {
            self.log_event(event_kind::BACKEND_FAILURE, json!({"cause": cause}))
                .await;
        }

        memory.push(MemoryEntry::now(MemoryRole::Assistant, &outcome.reply.text));
        self.store_memory(&memory).await;

        let degraded = outcome.is_degraded();
        let (frame, mode) = match outcome.reply.audio {
            Some(audio) => (OutboundFrame::AssistantAudio { audio }, "audio"),
            None => (
                OutboundFrame::AssistantText {
                    text: outcome.reply.text.clone(),
                },
                "text",
            ),
        };
        if self.state != CallState::Ended {
            // A dead channel means the socket task is gone; nothing to do.
            let _ = self.outbound.send(MessageRoute::Outgoing(frame));
        }

        self.log_event(
            event_kind::ASSISTANT_REPLY,
            json!({
                "mode": mode,
                "strategy": outcome.strategy,
                "degraded": degraded,
            }),
        )
        .await;

        self.turn_in_flight = false;
    }

    /// Best-effort event append. Persistence problems never abort a turn.
    async fn log_event(&self, kind: &str, payload: serde_json::Value) {
        if let Err(e) = self
            .ledger
            .append_event(&self.call_id, LogEvent::new(kind, payload))
            .await
        {
            self.log_ledger_error("event append", &e);
        }
    }

    async fn store_memory(&self, entries: &[MemoryEntry]) {
        if let Err(e) = self.ledger.replace_memory(&self.call_id, entries).await {
            self.log_ledger_error("memory replace", &e);
        }
    }

    fn log_ledger_error(&self, op: &str, error: &LedgerError) {
        warn!(call_id = %self.call_id, %error, "ledger {op} failed, continuing");
    }
}
