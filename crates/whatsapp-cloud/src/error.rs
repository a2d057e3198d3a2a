//! Error types for whatsapp-cloud.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when calling the WhatsApp Cloud API.
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with an error.
    #[error("API error {status} (code {code:?}, type {error_type:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        error_type: Option<String>,
        message: String,
    },

    /// A credential needed for the call is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The API answered successfully but without the expected data.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl CloudError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Transport failures, rate limits, and server-side errors are transient;
    /// rejected requests and missing credentials are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CloudError::Api { status, code, .. } => {
                *status == 429
                    || *status >= 500
                    || matches!(code, Some(4) | Some(80007) | Some(130429) | Some(131048))
            }
            CloudError::Json(_)
            | CloudError::UnexpectedResponse(_)
            | CloudError::MissingCredential(_) => false,
        }
    }

    /// Build an [`CloudError::Api`] from an error response body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<GraphErrorResponse>(body) {
            Ok(parsed) => CloudError::Api {
                status,
                code: parsed.error.code,
                error_type: parsed.error.error_type,
                message: parsed.error.message,
            },
            Err(_) => CloudError::Api {
                status,
                code: None,
                error_type: None,
                message: body.to_string(),
            },
        }
    }
}

/// Graph API error envelope.
#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<i64>,
}
