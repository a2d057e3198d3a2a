//! Configuration types for whatsapp-cloud.

use std::time::Duration;

/// Default Graph API base URL (includes the API version).
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v20.0";

/// Configuration for talking to the WhatsApp Cloud API.
#[derive(Clone)]
pub struct CloudConfig {
    /// Graph API base URL, e.g. `https://graph.facebook.com/v20.0`.
    pub api_base: String,
    /// Business phone number id that messages are sent from.
    pub phone_number_id: String,
    /// Access token. When `None`, every call fails with
    /// [`CloudError::MissingCredential`](crate::CloudError::MissingCredential).
    pub access_token: Option<String>,
    /// HTTP timeout for a single call.
    pub timeout: Duration,
}

impl CloudConfig {
    /// Create a configuration for the given phone number id.
    pub fn new(phone_number_id: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            phone_number_id: phone_number_id.into(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the send-message endpoint URL.
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }

    /// Get the media upload endpoint URL.
    pub fn media_upload_url(&self) -> String {
        format!("{}/{}/media", self.api_base, self.phone_number_id)
    }

    /// Get the metadata URL of one uploaded or received media object.
    pub fn media_url(&self, media_id: &str) -> String {
        format!("{}/{}", self.api_base, media_id)
    }
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("api_base", &self.api_base)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let config = CloudConfig::new("1234567890").with_api_base("http://localhost:9000/v20.0/");

        assert_eq!(
            config.messages_url(),
            "http://localhost:9000/v20.0/1234567890/messages"
        );
        assert_eq!(
            config.media_upload_url(),
            "http://localhost:9000/v20.0/1234567890/media"
        );
        assert_eq!(config.media_url("987"), "http://localhost:9000/v20.0/987");
    }

    #[test]
    fn test_blank_token_is_missing() {
        let config = CloudConfig::new("1").with_access_token("  ");
        assert!(config.access_token.is_none());

        let config = CloudConfig::new("1").with_access_token("EAAG");
        assert_eq!(config.access_token.as_deref(), Some("EAAG"));
        assert!(!format!("{:?}", config).contains("EAAG"));
    }
}
