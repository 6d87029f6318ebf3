//! HTTP inference backend tests against a mock chat-completions server.
//!
//! Each test stands up a wiremock server, points the gateway at it, and
//! checks both what the gateway sends and how it handles what comes back.
//! Failures of any kind must degrade the turn, never error it.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicebridge::core::inference::{
    ExtractionStrategy, FALLBACK_APOLOGY, HttpInference, InferenceBackend, InferenceConfig,
    InferenceRequest, UserInput,
};

fn config_for(server: &MockServer) -> InferenceConfig {
    InferenceConfig {
        url: format!("{}/v1/chat/completions", server.uri()),
        api_key: Some("test-key".to_string()),
        model: "gpt-4o-audio-preview".to_string(),
        voice: Some("alloy".to_string()),
        audio_format: "wav".to_string(),
        temperature: None,
        timeout: Duration::from_secs(2),
    }
}

fn text_request(text: &str) -> InferenceRequest {
    InferenceRequest {
        system_prompt: "You are a receptionist.".to_string(),
        memory: Vec::new(),
        user: UserInput::Text(text.to_string()),
    }
}

#[tokio::test]
async fn test_audio_reply_extracted_from_message_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-audio-preview",
            "modalities": ["text", "audio"],
            "audio": {"voice": "alloy", "format": "wav"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "audio": {
                        "data": "UklGRg==",
                        "transcript": "Hello, how can I help?"
                    }
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(!outcome.is_degraded());
    assert_eq!(outcome.strategy, Some(ExtractionStrategy::MessageAudio));
    assert_eq!(outcome.reply.text, "Hello, how can I help?");
    assert_eq!(outcome.reply.audio.as_deref(), Some("UklGRg=="));
}

#[tokio::test]
async fn test_text_reply_extracted_from_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Certainly."}}]
        })))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(!outcome.is_degraded());
    assert_eq!(outcome.strategy, Some(ExtractionStrategy::MessageContent));
    assert_eq!(outcome.reply.text, "Certainly.");
    assert!(outcome.reply.audio.is_none());
}

#[tokio::test]
async fn test_text_reply_extracted_from_content_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "Part one. "},
                {"type": "text", "text": "Part two."}
            ]}}]
        })))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert_eq!(outcome.strategy, Some(ExtractionStrategy::ContentParts));
    assert_eq!(outcome.reply.text, "Part one. Part two.");
}

#[tokio::test]
async fn test_text_reply_extracted_from_output_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output_text": "From the newer response shape."
        })))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert_eq!(outcome.strategy, Some(ExtractionStrategy::OutputText));
    assert_eq!(outcome.reply.text, "From the newer response shape.");
}

#[tokio::test]
async fn test_text_reply_extracted_from_legacy_choice_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "Legacy completion text."}]
        })))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert_eq!(outcome.strategy, Some(ExtractionStrategy::LegacyChoiceText));
    assert_eq!(outcome.reply.text, "Legacy completion text.");
}

#[tokio::test]
async fn test_audio_user_turn_sent_as_input_audio_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "You are a receptionist."},
                {"role": "user", "content": [{
                    "type": "input_audio",
                    "input_audio": {"data": "QUJDRA==", "format": "wav"}
                }]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Heard you."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let request = InferenceRequest {
        system_prompt: "You are a receptionist.".to_string(),
        memory: Vec::new(),
        user: UserInput::Audio {
            data: "QUJDRA==".to_string(),
            format: "wav".to_string(),
        },
    };
    let outcome = gateway.respond(request).await;
    assert_eq!(outcome.reply.text, "Heard you.");
}

#[tokio::test]
async fn test_server_error_degrades_with_status_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(outcome.is_degraded());
    assert_eq!(outcome.reply.text, FALLBACK_APOLOGY);
    let failure = outcome.failure.unwrap();
    assert!(failure.contains("503"), "missing status in: {failure}");
    assert!(failure.contains("overloaded"));
}

#[tokio::test]
async fn test_unrecognized_body_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": ""}}]
        })))
        .mount(&server)
        .await;

    let gateway = HttpInference::new(config_for(&server));
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(outcome.is_degraded());
    assert_eq!(outcome.reply.text, FALLBACK_APOLOGY);
    assert!(outcome.failure.unwrap().contains("no recognizable reply"));
}

#[tokio::test]
async fn test_slow_backend_degrades_on_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "too late"}}]}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.timeout = Duration::from_millis(200);
    let gateway = HttpInference::new(config);
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(outcome.is_degraded());
    assert_eq!(outcome.reply.text, FALLBACK_APOLOGY);
    assert!(outcome.failure.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_unreachable_backend_degrades() {
    let config = InferenceConfig {
        url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        api_key: None,
        model: "gpt-4o-audio-preview".to_string(),
        voice: None,
        audio_format: "wav".to_string(),
        temperature: None,
        timeout: Duration::from_secs(2),
    };
    let gateway = HttpInference::new(config);
    let outcome = gateway.respond(text_request("hi")).await;

    assert!(outcome.is_degraded());
    assert_eq!(outcome.reply.text, FALLBACK_APOLOGY);
}
