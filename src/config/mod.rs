//! Server configuration.
//!
//! Configuration is assembled from three layers. Priority, highest first:
//! 1. YAML file values (when a config file is given)
//! 2. Environment variables (a `.env` file is loaded into the environment at
//!    startup, with real environment variables taking precedence)
//! 3. Built-in defaults
//!
//! The inference API key is a secret and is zeroized when the config drops.

use std::path::{Path, PathBuf};
use std::time::Duration;

mod yaml;

use crate::core::inference::InferenceConfig;
use crate::core::session::{BinaryMediaPolicy, DEFAULT_PERSONA, SessionPolicy};
use crate::core::turn::TurnPolicy;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// How the bridge decides a caller turn is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    /// Batch media fragments, flushing once per elapsed window.
    TimeWindow,
    /// Flush on `user_speech` frames tagged final.
    Finality,
}

impl std::str::FromStr for TurnMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "time_window" | "window" => Ok(TurnMode::TimeWindow),
            "finality" | "explicit" => Ok(TurnMode::Finality),
            other => Err(ConfigError::Invalid {
                field: "turn_mode",
                reason: format!("unknown mode {other:?}, expected time_window or finality"),
            }),
        }
    }
}

fn parse_binary_media(s: &str) -> Result<BinaryMediaPolicy, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "buffer" => Ok(BinaryMediaPolicy::Buffer),
        "drop" => Ok(BinaryMediaPolicy::Drop),
        other => Err(ConfigError::Invalid {
            field: "binary_media",
            reason: format!("unknown policy {other:?}, expected buffer or drop"),
        }),
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL advertised to the telephony provider in
    /// webhook responses. Derived from host/port when unset.
    pub public_url: Option<String>,

    // Per-call storage
    pub data_dir: PathBuf,

    // Inference backend
    pub inference_url: String,
    pub inference_api_key: Option<String>,
    pub inference_model: String,
    /// Voice for synthesized replies; unset means text-only replies.
    pub inference_voice: Option<String>,
    pub inference_audio_format: String,
    pub inference_timeout_seconds: u64,
    pub inference_temperature: Option<f64>,

    // Conversation behavior
    pub persona: String,
    pub turn_mode: TurnMode,
    pub turn_window_ms: u64,
    pub binary_media: BinaryMediaPolicy,
    pub flush_on_close: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated, or "*" for all).
    /// Default: None (CORS disabled, same-origin only).
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent call connections. Default: None (unlimited).
    pub max_websocket_connections: Option<usize>,
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.inference_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: None,
            data_dir: PathBuf::from("data"),
            inference_url: "https://api.openai.com/v1/chat/completions".to_string(),
            inference_api_key: None,
            inference_model: "gpt-4o-audio-preview".to_string(),
            inference_voice: Some("alloy".to_string()),
            inference_audio_format: "wav".to_string(),
            inference_timeout_seconds: 20,
            inference_temperature: None,
            persona: DEFAULT_PERSONA.to_string(),
            turn_mode: TurnMode::TimeWindow,
            turn_window_ms: 1400,
            binary_media: BinaryMediaPolicy::Buffer,
            flush_on_close: false,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse().map_err(|e| ConfigError::Invalid {
                field: "PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Ok(url) = std::env::var("PUBLIC_URL") {
            config.public_url = Some(url);
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("INFERENCE_URL") {
            config.inference_url = url;
        }
        if let Ok(key) = std::env::var("INFERENCE_API_KEY") {
            config.inference_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("INFERENCE_MODEL") {
            config.inference_model = model;
        }
        if let Ok(voice) = std::env::var("INFERENCE_VOICE") {
            config.inference_voice = if voice.trim().is_empty() {
                None
            } else {
                Some(voice)
            };
        }
        if let Ok(format) = std::env::var("INFERENCE_AUDIO_FORMAT") {
            config.inference_audio_format = format;
        }
        if let Ok(timeout) = std::env::var("INFERENCE_TIMEOUT_SECONDS") {
            config.inference_timeout_seconds =
                timeout.parse().map_err(|e| ConfigError::Invalid {
                    field: "INFERENCE_TIMEOUT_SECONDS",
                    reason: format!("{e}"),
                })?;
        }
        if let Ok(temp) = std::env::var("INFERENCE_TEMPERATURE") {
            config.inference_temperature =
                Some(temp.parse().map_err(|e| ConfigError::Invalid {
                    field: "INFERENCE_TEMPERATURE",
                    reason: format!("{e}"),
                })?);
        }
        if let Ok(persona) = std::env::var("PERSONA") {
            config.persona = persona;
        }
        if let Ok(mode) = std::env::var("TURN_MODE") {
            config.turn_mode = mode.parse()?;
        }
        if let Ok(window) = std::env::var("TURN_WINDOW_MS") {
            config.turn_window_ms = window.parse().map_err(|e| ConfigError::Invalid {
                field: "TURN_WINDOW_MS",
                reason: format!("{e}"),
            })?;
        }
        if let Ok(policy) = std::env::var("BINARY_MEDIA") {
            config.binary_media = parse_binary_media(&policy)?;
        }
        if let Ok(flush) = std::env::var("FLUSH_ON_CLOSE") {
            config.flush_on_close = flush.trim().eq_ignore_ascii_case("true");
        }
        if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = Some(origins);
        }
        if let Ok(rps) = std::env::var("RATE_LIMIT_REQUESTS_PER_SECOND") {
            config.rate_limit_requests_per_second =
                rps.parse().map_err(|e| ConfigError::Invalid {
                    field: "RATE_LIMIT_REQUESTS_PER_SECOND",
                    reason: format!("{e}"),
                })?;
        }
        if let Ok(burst) = std::env::var("RATE_LIMIT_BURST_SIZE") {
            config.rate_limit_burst_size = burst.parse().map_err(|e| ConfigError::Invalid {
                field: "RATE_LIMIT_BURST_SIZE",
                reason: format!("{e}"),
            })?;
        }
        if let Ok(max) = std::env::var("MAX_WEBSOCKET_CONNECTIONS") {
            config.max_websocket_connections =
                Some(max.parse().map_err(|e| ConfigError::Invalid {
                    field: "MAX_WEBSOCKET_CONNECTIONS",
                    reason: format!("{e}"),
                })?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load environment-based configuration, then apply YAML overrides from
    /// a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        let overlay = yaml::YamlConfig::from_file(path)?;
        overlay.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.turn_window_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "turn_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.inference_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "inference_timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.inference_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "inference_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Server bind address as "host:port".
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL the telephony provider should stream the call to.
    pub fn stream_url(&self) -> String {
        match &self.public_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let ws_base = if let Some(rest) = base.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = base.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    base.to_string()
                };
                format!("{ws_base}/call")
            }
            None => format!("ws://{}/call", self.address()),
        }
    }

    /// Resolve the per-session behavior knobs.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            turn_policy: match self.turn_mode {
                TurnMode::TimeWindow => TurnPolicy::TimeWindow {
                    window: Duration::from_millis(self.turn_window_ms),
                },
                TurnMode::Finality => TurnPolicy::ExplicitFinality,
            },
            binary_media: self.binary_media,
            flush_on_close: self.flush_on_close,
            persona: self.persona.clone(),
            audio_input_format: self.inference_audio_format.clone(),
        }
    }

    /// Resolve the inference backend configuration.
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            url: self.inference_url.clone(),
            api_key: self.inference_api_key.clone(),
            model: self.inference_model.clone(),
            voice: self.inference_voice.clone(),
            audio_format: self.inference_audio_format.clone(),
            temperature: self.inference_temperature,
            timeout: Duration::from_secs(self.inference_timeout_seconds),
        }
    }
}
