//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use brain_core::BrainError;
use openai_brain::OpenAiBrainConfig;
use orchestrator::PipelineConfig;
use whatsapp_cloud::{CloudConfig, DEFAULT_API_BASE};

/// Inbox server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// WhatsApp Cloud API client settings.
    pub cloud: CloudConfig,
    /// Token echoed back during the webhook subscription handshake.
    pub verify_token: String,
    /// App secret for `X-Hub-Signature-256` checks; unset disables them.
    pub app_secret: Option<String>,
    /// Model API settings.
    pub openai: OpenAiBrainConfig,
    /// Reply pipeline limits.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `INBOX_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:inbox.db?mode=rwc` |
    /// | `WHATSAPP_API_BASE` | Graph API base URL | `https://graph.facebook.com/v20.0` |
    /// | `WHATSAPP_ACCESS_TOKEN` | Cloud API access token | (unset: sends fail) |
    /// | `WHATSAPP_PHONE_NUMBER_ID` | Sender phone number id | (required) |
    /// | `WHATSAPP_VERIFY_TOKEN` | Webhook handshake token | (required) |
    /// | `WHATSAPP_APP_SECRET` | Webhook signature secret | (unset: no check) |
    /// | `OPENAI_API_KEY` | Model API key | (unset: replies escalate) |
    /// | `OPENAI_API_URL` | Model API URL | `https://api.openai.com` |
    /// | `INSTRUCTION_MAX_CHARS` | Instruction character budget | `4000` |
    /// | `GENERATION_TIMEOUT_SECS` | Model call timeout | `30` |
    /// | `SEND_TIMEOUT_SECS` | Channel call timeout | `15` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("INBOX_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "sqlite:inbox.db?mode=rwc".to_string());

        let phone_number_id = required("WHATSAPP_PHONE_NUMBER_ID")?;
        let verify_token = required("WHATSAPP_VERIFY_TOKEN")?;
        let app_secret = optional("WHATSAPP_APP_SECRET");

        let mut cloud = CloudConfig::new(phone_number_id)
            .with_api_base(env::var("WHATSAPP_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()));
        if let Some(token) = optional("WHATSAPP_ACCESS_TOKEN") {
            cloud = cloud.with_access_token(token);
        }

        let openai = OpenAiBrainConfig::from_env()?;

        let mut pipeline = PipelineConfig::default();
        if let Some(chars) = number::<usize>("INSTRUCTION_MAX_CHARS")? {
            pipeline = pipeline.with_instruction_max_chars(chars);
        }
        if let Some(secs) = number::<u64>("GENERATION_TIMEOUT_SECS")? {
            pipeline = pipeline.with_generation_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = number::<u64>("SEND_TIMEOUT_SECS")? {
            cloud = cloud.with_timeout(Duration::from_secs(secs));
            pipeline = pipeline.with_send_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            addr,
            database_url,
            cloud,
            verify_token,
            app_secret,
            openai,
            pipeline,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid INBOX_ADDR format")]
    InvalidAddr,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Model configuration error: {0}")]
    Brain(#[from] BrainError),
}
