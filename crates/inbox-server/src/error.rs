//! Error types for the operator API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use orchestrator::{DispatchError, OrchestratorError};
use thiserror::Error;

/// Errors that can occur while handling an operator request.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database error.
    #[error("{0}")]
    Database(#[from] DatabaseError),

    /// Sending a message failed.
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// A manual analysis or follow-up pass failed.
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// The request body or query is unusable.
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status and a short machine-readable kind.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(e) => classify_database(e),
            AppError::Dispatch(e) => classify_dispatch(e),
            AppError::Orchestrator(e) => match e {
                OrchestratorError::Database(e) => classify_database(e),
                OrchestratorError::Dispatch(e) => classify_dispatch(e),
                OrchestratorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                OrchestratorError::Brain(_) => (StatusCode::BAD_GATEWAY, "generation"),
                OrchestratorError::InvalidAnalysis(_) => (StatusCode::BAD_GATEWAY, "invalid_analysis"),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid"),
        }
    }

    fn accepted_id(&self) -> Option<&str> {
        match self {
            AppError::Dispatch(e) | AppError::Orchestrator(OrchestratorError::Dispatch(e)) => {
                e.accepted_id()
            }
            _ => None,
        }
    }
}

fn classify_database(err: &DatabaseError) -> (StatusCode, &'static str) {
    match err {
        DatabaseError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        DatabaseError::AlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
        DatabaseError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
    }
}

fn classify_dispatch(err: &DispatchError) -> (StatusCode, &'static str) {
    match err {
        DispatchError::Channel { transient: true, .. } | DispatchError::Timeout => {
            (StatusCode::BAD_GATEWAY, "channel_transient")
        }
        DispatchError::Channel { .. } => (StatusCode::BAD_GATEWAY, "channel_rejected"),
        DispatchError::Configuration(_) => (StatusCode::SERVICE_UNAVAILABLE, "channel_configuration"),
        DispatchError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid"),
        DispatchError::Database(e) => classify_database(e),
        DispatchError::Unrecorded { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "unrecorded"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        if status.is_server_error() {
            tracing::error!(kind, "Request failed: {}", self);
        } else {
            tracing::debug!(kind, "Request rejected: {}", self);
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "kind": kind,
        });
        if let AppError::Dispatch(DispatchError::Channel {
            code, error_type, ..
        }) = &self
        {
            body["code"] = serde_json::json!(code);
            body["error_type"] = serde_json::json!(error_type);
        }
        // The contact got the message; a client retry would duplicate it.
        if let Some(wa_message_id) = self.accepted_id() {
            body["wa_message_id"] = serde_json::json!(wa_message_id);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, AppError>;
