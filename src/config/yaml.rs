//! YAML configuration overlay.
//!
//! Every field is optional so a file can override just the values it cares
//! about; anything left unset keeps the environment/default value.
//!
//! # Example YAML structure
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 3001
//!   public_url: "https://bridge.example.com"
//!
//! storage:
//!   data_dir: "/var/lib/voicebridge"
//!
//! inference:
//!   url: "https://api.openai.com/v1/chat/completions"
//!   api_key: "sk-..."
//!   model: "gpt-4o-audio-preview"
//!   voice: "alloy"
//!   audio_format: "wav"
//!   timeout_seconds: 20
//!   temperature: 0.7
//!
//! conversation:
//!   persona: "You are Ava, the receptionist at Harbor Dental."
//!   turn_mode: "time_window"
//!   turn_window_ms: 1400
//!   binary_media: "buffer"
//!   flush_on_close: false
//!
//! security:
//!   cors_allowed_origins: "*"
//!   rate_limit_requests_per_second: 60
//!   rate_limit_burst_size: 10
//!   max_websocket_connections: 500
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{ConfigError, ServerConfig, parse_binary_media};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub storage: Option<StorageYaml>,
    pub inference: Option<InferenceYaml>,
    pub conversation: Option<ConversationYaml>,
    pub security: Option<SecurityYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InferenceYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub audio_format: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConversationYaml {
    pub persona: Option<String>,
    pub turn_mode: Option<String>,
    pub turn_window_ms: Option<u64>,
    pub binary_media: Option<String>,
    pub flush_on_close: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Apply every present field over the given configuration.
    pub fn apply(self, config: &mut ServerConfig) -> Result<(), ConfigError> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(url) = server.public_url {
                config.public_url = Some(url);
            }
        }

        if let Some(storage) = self.storage {
            if let Some(dir) = storage.data_dir {
                config.data_dir = dir;
            }
        }

        if let Some(inference) = self.inference {
            if let Some(url) = inference.url {
                config.inference_url = url;
            }
            if let Some(key) = inference.api_key {
                config.inference_api_key = Some(key);
            }
            if let Some(model) = inference.model {
                config.inference_model = model;
            }
            if let Some(voice) = inference.voice {
                config.inference_voice = if voice.trim().is_empty() {
                    None
                } else {
                    Some(voice)
                };
            }
            if let Some(format) = inference.audio_format {
                config.inference_audio_format = format;
            }
            if let Some(timeout) = inference.timeout_seconds {
                config.inference_timeout_seconds = timeout;
            }
            if let Some(temperature) = inference.temperature {
                config.inference_temperature = Some(temperature);
            }
        }

        if let Some(conversation) = self.conversation {
            if let Some(persona) = conversation.persona {
                config.persona = persona;
            }
            if let Some(mode) = conversation.turn_mode {
                config.turn_mode = mode.parse()?;
            }
            if let Some(window) = conversation.turn_window_ms {
                config.turn_window_ms = window;
            }
            if let Some(policy) = conversation.binary_media {
                config.binary_media = parse_binary_media(&policy)?;
            }
            if let Some(flush) = conversation.flush_on_close {
                config.flush_on_close = flush;
            }
        }

        if let Some(security) = self.security {
            if let Some(origins) = security.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                config.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                config.rate_limit_burst_size = burst;
            }
            if let Some(max) = security.max_websocket_connections {
                config.max_websocket_connections = Some(max);
            }
        }

        Ok(())
    }
}
