//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use orchestrator::Pipeline;

/// Webhook authentication settings.
#[derive(Debug, Clone)]
pub struct WebhookAuth {
    /// Token expected in the subscription handshake.
    pub verify_token: String,
    /// Secret for payload signatures; `None` accepts unsigned deliveries.
    pub app_secret: Option<String>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Ingestion, reply, and dispatch pipeline.
    pub pipeline: Pipeline,
    /// Webhook authentication.
    pub webhook: Arc<WebhookAuth>,
}

impl AppState {
    /// Create new application state.
    pub fn new(pipeline: Pipeline, webhook: WebhookAuth) -> Self {
        Self {
            db: pipeline.database().clone(),
            pipeline,
            webhook: Arc::new(webhook),
        }
    }
}
