//! Learned rule routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::{learned_rule, LearnedRule};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

fn default_active() -> bool {
    true
}

/// Request to add a rule by hand.
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub rule: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<LearnedRule>>> {
    Ok(Json(learned_rule::list_rules(state.db.pool()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<LearnedRule>)> {
    let rule = learned_rule::create_rule(state.db.pool(), &req.rule, req.active, None).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Approve or retire a rule.
pub async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ActiveRequest>,
) -> Result<StatusCode> {
    learned_rule::set_active(state.db.pool(), id, req.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    learned_rule::delete_rule(state.db.pool(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
