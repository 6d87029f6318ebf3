//! Inference gateway: one turn in, one spoken/text reply out.
//!
//! The [`InferenceBackend`] trait is the seam between call sessions and the
//! external conversational backend. Implementations turn an ordered prompt
//! sequence `[system, ...prior memory, current user turn]` into an
//! [`InferenceOutcome`] and make exactly one backend call per turn.
//!
//! Failures never cross this boundary as errors: a transport problem,
//! timeout, non-2xx status, or unrecognizable response body is converted
//! into a degraded outcome carrying a fixed apology, with the cause attached
//! so the session can record it in the call's event log.

mod extract;
mod http;

pub use extract::{ExtractedReply, ExtractionStrategy, extract_reply};
pub use http::{HttpInference, InferenceConfig};

use async_trait::async_trait;

use crate::core::ledger::MemoryEntry;

/// Fixed apology substituted when the backend fails or times out.
pub const FALLBACK_APOLOGY: &str =
    "I'm sorry, I'm having a little trouble on my end. Could you say that again in a moment?";

/// The caller's input for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    /// A finalized transcript.
    Text(String),
    /// Base64-encoded audio for backends that accept audio input directly.
    Audio { data: String, format: String },
}

impl UserInput {
    /// Textual representation stored in conversation memory and fed to the
    /// intent classifier. Audio turns get a placeholder since no transcript
    /// exists on our side.
    pub fn memory_text(&self) -> String {
        match self {
            UserInput::Text(text) => text.clone(),
            UserInput::Audio { data, .. } => {
                format!("[caller audio, {} bytes base64]", data.len())
            }
        }
    }
}

/// One turn's request to the backend.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// System prompt, always first in the replayed sequence.
    pub system_prompt: String,
    /// Prior conversation memory in insertion order.
    pub memory: Vec<MemoryEntry>,
    /// The current user turn, always last.
    pub user: UserInput,
}

/// The assistant's reply for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    /// Reply text; may be empty when the backend produced only audio.
    pub text: String,
    /// Base64-encoded synthesized audio, when available.
    pub audio: Option<String>,
}

/// Result of one turn, success or degraded.
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub reply: AssistantReply,
    /// Which extraction strategy produced the reply, for observability.
    pub strategy: Option<ExtractionStrategy>,
    /// Present when the backend failed and the reply is the fixed apology.
    pub failure: Option<String>,
}

impl InferenceOutcome {
    /// A successful outcome with the strategy that matched.
    pub fn success(reply: AssistantReply, strategy: ExtractionStrategy) -> Self {
        Self {
            reply,
            strategy: Some(strategy),
            failure: None,
        }
    }

    /// The degraded fallback: fixed apology text, no audio, cause attached.
    pub fn degraded(cause: impl Into<String>) -> Self {
        Self {
            reply: AssistantReply {
                text: FALLBACK_APOLOGY.to_string(),
                audio: None,
            },
            strategy: None,
            failure: Some(cause.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Gateway to the external conversational backend.
///
/// Callers must not dispatch a second turn for the same call until the
/// previous outcome has been merged into memory (single-flight per call);
/// the session enforces that invariant.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one turn. Never returns an error: backend failures become
    /// degraded outcomes.
    async fn respond(&self, request: InferenceRequest) -> InferenceOutcome;
}
