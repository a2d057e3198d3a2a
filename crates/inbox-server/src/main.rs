//! WhatsApp sales inbox server.
//!
//! Receives provider webhooks, runs the automated reply pipeline, and serves
//! the JSON API the operator inbox is built on.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::Database;
use openai_brain::OpenAiBrain;
use orchestrator::Pipeline;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use whatsapp_cloud::CloudClient;

use crate::config::Config;
use crate::state::{AppState, WebhookAuth};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting inbox server");
    if config.app_secret.is_none() {
        tracing::warn!("WHATSAPP_APP_SECRET is not set; webhook signatures will not be checked");
    }

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Provider channel and model
    let channel = Arc::new(CloudClient::new(config.cloud)?);
    let brain = Arc::new(OpenAiBrain::new(config.openai)?);

    let pipeline = Pipeline::builder(db, channel, brain.clone())
        .with_synthesizer(brain.clone())
        .with_transcriber(brain)
        .with_config(config.pipeline)
        .build();

    // Build application state
    let state = AppState::new(
        pipeline,
        WebhookAuth {
            verify_token: config.verify_token,
            app_secret: config.app_secret,
        },
    );

    // Build router
    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Start server
    info!(addr = %config.addr, "Inbox server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
