//! Configuration for OpenAiBrain.

use brain_core::BrainError;
use std::env;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.openai.com";

/// Configuration for OpenAiBrain.
///
/// Generation parameters (model, max tokens, temperature) are not part of
/// this config: they come from the automation settings on every request.
#[derive(Debug, Clone)]
pub struct OpenAiBrainConfig {
    /// API base URL, without the `/v1` suffix.
    pub api_url: String,

    /// API key for authentication. Empty means unconfigured.
    pub api_key: String,

    /// Model used when a request does not name one.
    pub default_model: String,

    /// Text-to-speech model.
    pub speech_model: String,

    /// Speech-to-text model.
    pub transcription_model: String,

    /// HTTP timeout for a single API call.
    pub request_timeout_secs: u64,
}

impl Default for OpenAiBrainConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            default_model: "gpt-4o-mini".to_string(),
            speech_model: "tts-1".to_string(),
            transcription_model: "whisper-1".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl OpenAiBrainConfig {
    /// Create configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `OPENAI_API_KEY` - API key (calls fail with a configuration error when unset)
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_MODEL` - Fallback model name (default: gpt-4o-mini)
    /// - `OPENAI_SPEECH_MODEL` - Text-to-speech model (default: tts-1)
    /// - `OPENAI_TRANSCRIPTION_MODEL` - Speech-to-text model (default: whisper-1)
    /// - `OPENAI_TIMEOUT_SECS` - HTTP timeout (default: 60)
    pub fn from_env() -> Result<Self, BrainError> {
        let defaults = Self::default();

        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let api_url = env::var("OPENAI_API_URL").unwrap_or(defaults.api_url);
        let default_model = env::var("OPENAI_MODEL").unwrap_or(defaults.default_model);
        let speech_model = env::var("OPENAI_SPEECH_MODEL").unwrap_or(defaults.speech_model);
        let transcription_model =
            env::var("OPENAI_TRANSCRIPTION_MODEL").unwrap_or(defaults.transcription_model);

        let request_timeout_secs = match env::var("OPENAI_TIMEOUT_SECS") {
            Ok(v) => v.parse().map_err(|_| {
                BrainError::Configuration(format!("OPENAI_TIMEOUT_SECS is not a number: {}", v))
            })?,
            Err(_) => defaults.request_timeout_secs,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            speech_model,
            transcription_model,
            request_timeout_secs,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiBrainConfigBuilder {
        OpenAiBrainConfigBuilder::default()
    }

    /// Whether an API key is present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Builder for OpenAiBrainConfig.
#[derive(Debug, Default)]
pub struct OpenAiBrainConfigBuilder {
    config: OpenAiBrainConfig,
}

impl OpenAiBrainConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the fallback model name.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    /// Set the text-to-speech model.
    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.config.speech_model = model.into();
        self
    }

    /// Set the speech-to-text model.
    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription_model = model.into();
        self
    }

    /// Set the HTTP timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiBrainConfig {
        self.config
    }
}
