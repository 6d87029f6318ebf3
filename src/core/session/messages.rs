//! Wire frames for the telephony duplex connection.
//!
//! Inbound frames are JSON objects tagged by an `event` field. The telephony
//! side is not fully under our control, so parsing is tolerant: unrecognized
//! event values deserialize to [`InboundFrame::Unknown`] instead of failing,
//! and field aliases cover the provider's spelling variants (`call_sid`,
//! `isFinal` vs `is_final`).

use serde::{Deserialize, Serialize};

/// A parsed inbound frame from the telephony stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundFrame {
    /// The call begins. May carry the provider's own call id, which the
    /// session adopts in place of its generated one.
    Start {
        #[serde(default, alias = "call_sid", alias = "callSid")]
        call_id: Option<String>,
        #[serde(default)]
        caller: Option<String>,
    },
    /// One media fragment: base64 audio or an opaque transcript chunk.
    Media { payload: String },
    /// A pre-transcribed speech fragment from the provider's own STT.
    UserSpeech {
        text: String,
        #[serde(rename = "isFinal", alias = "is_final", default)]
        is_final: bool,
        #[serde(default)]
        emotion: Option<String>,
    },
    /// The provider is ending the call.
    Stop,
    /// Alternate termination event some providers send instead of `stop`.
    CallEnd,
    /// Any event value we do not recognize. Logged and ignored.
    #[serde(other)]
    Unknown,
}

/// A frame emitted back to the telephony stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Synthesized assistant audio, base64-encoded.
    AssistantAudio { audio: String },
    /// Assistant text, used only when no audio is available for this turn.
    AssistantText { text: String },
    /// Protocol-level diagnostic. Advisory only; never terminates the call.
    Error { message: String },
}

/// Commands routed to the dedicated socket-sender task.
///
/// The session never touches the socket directly; it pushes routes onto an
/// unbounded channel and a sender task owns the write half. Send failures
/// after close are swallowed by the sender, not surfaced to the session.
#[derive(Debug, Clone)]
pub enum MessageRoute {
    Outgoing(OutboundFrame),
    Close,
}
