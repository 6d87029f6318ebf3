//! Tolerant extraction of reply content from backend responses.
//!
//! Conversational backends have shipped the reply text/audio under several
//! field names and array positions over time, and OpenAI-compatible clones
//! are looser still. Rather than duck-typed probing scattered through the
//! client, extraction is an ordered list of tagged strategies tried in
//! priority order; the first one yielding non-empty content wins, and which
//! strategy matched is reported so it can be logged.

use serde::Serialize;
use serde_json::Value;

/// The recognized response shapes, in probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// `choices[0].message.audio.{data, transcript}`, the audio-modality reply.
    MessageAudio,
    /// `choices[0].message.content` as a plain string.
    MessageContent,
    /// `choices[0].message.content` as an array of content parts.
    ContentParts,
    /// Top-level `output_text` (responses-style shape).
    OutputText,
    /// `choices[0].text`, the legacy completions shape.
    LegacyChoiceText,
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ExtractionStrategy::MessageAudio => "message_audio",
            ExtractionStrategy::MessageContent => "message_content",
            ExtractionStrategy::ContentParts => "content_parts",
            ExtractionStrategy::OutputText => "output_text",
            ExtractionStrategy::LegacyChoiceText => "legacy_choice_text",
        };
        write!(f, "{tag}")
    }
}

/// Reply content pulled out of a backend response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReply {
    /// Assistant text. May be empty when only audio was produced.
    pub text: String,
    /// Base64-encoded assistant audio, when the backend synthesized any.
    pub audio: Option<String>,
}

/// Probe the fixed strategy order against a response body.
///
/// Returns the first strategy that yields non-empty content together with
/// the extracted reply, or `None` when no strategy matches.
pub fn extract_reply(body: &Value) -> Option<(ExtractionStrategy, ExtractedReply)> {
    const ORDER: [ExtractionStrategy; 5] = [
        ExtractionStrategy::MessageAudio,
        ExtractionStrategy::MessageContent,
        ExtractionStrategy::ContentParts,
        ExtractionStrategy::OutputText,
        ExtractionStrategy::LegacyChoiceText,
    ];

    for strategy in ORDER {
        if let Some(reply) = try_strategy(strategy, body) {
            return Some((strategy, reply));
        }
    }
    None
}

fn try_strategy(strategy: ExtractionStrategy, body: &Value) -> Option<ExtractedReply> {
    match strategy {
        ExtractionStrategy::MessageAudio => {
            let audio = message(body)?.get("audio")?;
            let data = audio.get("data")?.as_str()?;
            if data.is_empty() {
                return None;
            }
            let transcript = audio
                .get("transcript")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(ExtractedReply {
                text: transcript.to_string(),
                audio: Some(data.to_string()),
            })
        }
        ExtractionStrategy::MessageContent => {
            let content = message(body)?.get("content")?.as_str()?;
            non_empty_text(content)
        }
        ExtractionStrategy::ContentParts => {
            let parts = message(body)?.get("content")?.as_array()?;
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("");
            non_empty_text(&text)
        }
        ExtractionStrategy::OutputText => {
            let text = body.get("output_text")?.as_str()?;
            non_empty_text(text)
        }
        ExtractionStrategy::LegacyChoiceText => {
            let text = body.get("choices")?.get(0)?.get("text")?.as_str()?;
            non_empty_text(text)
        }
    }
}

fn message(body: &Value) -> Option<&Value> {
    body.get("choices")?.get(0)?.get("message")
}

fn non_empty_text(text: &str) -> Option<ExtractedReply> {
    if text.trim().is_empty() {
        None
    } else {
        Some(ExtractedReply {
            text: text.to_string(),
            audio: None,
        })
    }
}
