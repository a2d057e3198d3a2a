//! Error types for brain operations.

use thiserror::Error;

/// Errors that can occur while calling a generative model.
#[derive(Debug, Error)]
pub enum BrainError {
    /// Missing or invalid configuration (e.g. no API key).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not reach the model provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected or failed the request.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The provider answered without usable content.
    #[error("empty response from model")]
    EmptyResponse,

    /// A timeout occurred during processing.
    #[error("processing timed out")]
    Timeout,

    /// The backend does not implement this capability.
    #[error("unsupported: {0}")]
    Unsupported(String),
}
