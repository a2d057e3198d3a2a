//! Error types for orchestrator operations.

use brain_core::BrainError;
use database::DatabaseError;
use thiserror::Error;
use whatsapp_cloud::CloudError;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Storage failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Outbound dispatch failed.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Model call failed.
    #[error("brain error: {0}")]
    Brain(#[from] BrainError),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The model answered an analysis request with something unusable.
    #[error("invalid analysis: {0}")]
    InvalidAnalysis(String),
}

impl OrchestratorError {
    /// Whether this error means a referenced record is missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            OrchestratorError::NotFound(_) => true,
            OrchestratorError::Database(e) => e.is_not_found(),
            OrchestratorError::Dispatch(DispatchError::Database(e)) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Errors from sending a message to the external channel.
///
/// A dispatch that fails never leaves an outbound message row behind. Only
/// [`DispatchError::Unrecorded`] means the contact may have received it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The channel rejected the call or could not be reached.
    #[error("channel error (status {status:?}, code {code:?}, type {error_type:?}): {message}")]
    Channel {
        /// Retrying later may succeed (rate limit, outage, network).
        transient: bool,
        status: Option<u16>,
        code: Option<i64>,
        error_type: Option<String>,
        message: String,
    },

    /// Credentials or other startup configuration are missing.
    #[error("channel configuration error: {0}")]
    Configuration(String),

    /// The channel did not answer in time.
    #[error("send timed out")]
    Timeout,

    /// The request itself is unusable (empty text, blank recipient).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage failed before anything was sent.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The channel accepted the message but storing it failed. Sending it
    /// again would deliver a duplicate.
    #[error("message {wa_message_id} was sent but not recorded: {source}")]
    Unrecorded {
        wa_message_id: String,
        #[source]
        source: DatabaseError,
    },
}

impl DispatchError {
    /// Whether retrying the same dispatch later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Channel { transient, .. } => *transient,
            DispatchError::Timeout => true,
            _ => false,
        }
    }

    /// Provider id of a message the channel accepted despite this error.
    pub fn accepted_id(&self) -> Option<&str> {
        match self {
            DispatchError::Unrecorded { wa_message_id, .. } => Some(wa_message_id),
            _ => None,
        }
    }
}

impl From<CloudError> for DispatchError {
    fn from(err: CloudError) -> Self {
        let transient = err.is_transient();
        match err {
            CloudError::MissingCredential(what) => {
                DispatchError::Configuration(format!("{} is not configured", what))
            }
            CloudError::Api {
                status,
                code,
                error_type,
                message,
            } => DispatchError::Channel {
                transient,
                status: Some(status),
                code,
                error_type,
                message,
            },
            other => DispatchError::Channel {
                transient,
                status: None,
                code: None,
                error_type: None,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_error_mapping() {
        let err = DispatchError::from(CloudError::MissingCredential("WhatsApp access token"));
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert!(!err.is_transient());

        let err = DispatchError::from(CloudError::Api {
            status: 429,
            code: Some(130429),
            error_type: None,
            message: "Rate limit hit".to_string(),
        });
        match &err {
            DispatchError::Channel {
                transient, status, code, ..
            } => {
                assert!(*transient);
                assert_eq!(*status, Some(429));
                assert_eq!(*code, Some(130429));
            }
            other => panic!("Expected Channel error, got {:?}", other),
        }

        let err = DispatchError::from(CloudError::Api {
            status: 400,
            code: Some(131030),
            error_type: Some("OAuthException".to_string()),
            message: "Recipient phone number not in allowed list".to_string(),
        });
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unrecorded_reports_accepted_id() {
        let err = DispatchError::Unrecorded {
            wa_message_id: "wamid.OUT9".to_string(),
            source: DatabaseError::NotFound {
                entity: "Message",
                id: "wamid.OUT9".to_string(),
            },
        };
        assert_eq!(err.accepted_id(), Some("wamid.OUT9"));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("sent but not recorded"));

        assert_eq!(DispatchError::Timeout.accepted_id(), None);
    }

    #[test]
    fn test_not_found_detection() {
        let err = OrchestratorError::Database(DatabaseError::NotFound {
            entity: "Conversation",
            id: "7".to_string(),
        });
        assert!(err.is_not_found());
        assert!(!OrchestratorError::InvalidAnalysis("x".to_string()).is_not_found());
    }
}
