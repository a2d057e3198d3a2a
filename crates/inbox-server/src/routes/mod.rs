//! Route handlers for the webhook and the operator API.

pub mod conversations;
pub mod health;
pub mod log;
pub mod messages;
pub mod operators;
pub mod rules;
pub mod settings;
pub mod webhook;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Provider webhook
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        // Conversations
        .route("/api/conversations", get(conversations::list))
        .route(
            "/api/conversations/:id",
            get(conversations::get).delete(conversations::delete),
        )
        .route(
            "/api/conversations/:id/messages",
            get(messages::list).post(messages::send_to_conversation),
        )
        .route("/api/conversations/:id/pinned", put(conversations::set_pinned))
        .route("/api/conversations/:id/automation", put(conversations::set_automation))
        .route("/api/conversations/:id/should-call", put(conversations::set_should_call))
        .route("/api/conversations/:id/label", put(conversations::set_label))
        .route("/api/conversations/:id/order-status", put(conversations::set_order_status))
        .route("/api/conversations/:id/assignee", put(conversations::set_assignee))
        .route(
            "/api/conversations/:id/clear-attention",
            post(conversations::clear_attention),
        )
        .route("/api/conversations/:id/analyze", post(conversations::analyze))
        .route("/api/conversations/:id/follow-up", post(conversations::follow_up))
        .route("/api/messages", post(messages::send_to_contact))
        // Operators
        .route("/api/operators", get(operators::list).post(operators::create))
        .route(
            "/api/operators/:id",
            put(operators::update).delete(operators::delete),
        )
        // Automation
        .route("/api/settings", get(settings::get).put(settings::update))
        .route("/api/rules", get(rules::list).post(rules::create))
        .route("/api/rules/:id", axum::routing::delete(rules::delete))
        .route("/api/rules/:id/active", put(rules::set_active))
        .route("/api/automation-log", get(log::list))
}
