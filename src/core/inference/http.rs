//! HTTP implementation of the inference gateway.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. The request
//! replays the ordered prompt sequence as role/content messages and, when a
//! voice is configured, asks for an audio modality so the reply can be
//! streamed straight back to the caller. The HTTP client is reused across
//! requests for connection pooling.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::extract::extract_reply;
use super::{InferenceBackend, InferenceOutcome, InferenceRequest, UserInput};
use crate::core::ledger::MemoryRole;

/// Configuration for the HTTP inference backend.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Full URL of the chat-completions endpoint.
    pub url: String,
    /// Bearer token; omitted from the request when `None`.
    pub api_key: Option<String>,
    pub model: String,
    /// Voice for synthesized audio replies. `None` disables the audio
    /// modality and the bridge falls back to text frames.
    pub voice: Option<String>,
    /// Audio container format requested from the backend (e.g. "wav").
    pub audio_format: String,
    pub temperature: Option<f64>,
    /// Bounded wait for the whole call; exceeding it degrades the turn.
    pub timeout: Duration,
}

/// Errors internal to the HTTP gateway. These never escape [`respond`];
/// they are flattened into degraded outcomes.
#[derive(Debug, thiserror::Error)]
enum InferenceError {
    #[error("backend request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("backend response had no recognizable reply content")]
    UnrecognizedShape,
}

/// OpenAI-compatible chat-completions gateway.
pub struct HttpInference {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl HttpInference {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Build the request body, preserving the prompt order:
    /// `[system, ...prior memory, current user turn]`.
    fn build_body(&self, request: &InferenceRequest) -> Value {
        let mut messages = Vec::with_capacity(request.memory.len() + 2);
        messages.push(json!({"role": "system", "content": request.system_prompt}));

        for entry in &request.memory {
            let role = match entry.role {
                MemoryRole::System => "system",
                MemoryRole::User => "user",
                MemoryRole::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": entry.content}));
        }

        match &request.user {
            UserInput::Text(text) => {
                messages.push(json!({"role": "user", "content": text}));
            }
            UserInput::Audio { data, format } => {
                messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "input_audio",
                        "input_audio": {"data": data, "format": format}
                    }]
                }));
            }
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });

        if let Some(voice) = &self.config.voice {
            body["modalities"] = json!(["text", "audio"]);
            body["audio"] = json!({"voice": voice, "format": self.config.audio_format});
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    async fn call(&self, request: &InferenceRequest) -> Result<InferenceOutcome, InferenceError> {
        let body = self.build_body(request);

        let mut http_request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.config.timeout, http_request.send())
            .await
            .map_err(|_| InferenceError::Timeout(self.config.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let detail = tokio::time::timeout(self.config.timeout, response.text())
                .await
                .map_err(|_| InferenceError::Timeout(self.config.timeout))?
                .unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                detail: detail.chars().take(200).collect(),
            });
        }

        let parsed: Value = tokio::time::timeout(self.config.timeout, response.json())
            .await
            .map_err(|_| InferenceError::Timeout(self.config.timeout))??;

        let (strategy, extracted) =
            extract_reply(&parsed).ok_or(InferenceError::UnrecognizedShape)?;

        debug!(%strategy, "extracted backend reply");
        Ok(InferenceOutcome::success(
            super::AssistantReply {
                text: extracted.text,
                audio: extracted.audio,
            },
            strategy,
        ))
    }
}

#[async_trait::async_trait]
impl InferenceBackend for HttpInference {
    async fn respond(&self, request: InferenceRequest) -> InferenceOutcome {
        match self.call(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "inference backend failed, degrading turn");
                InferenceOutcome::degraded(e.to_string())
            }
        }
    }
}
