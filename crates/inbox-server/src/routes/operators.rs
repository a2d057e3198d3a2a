//! Operator routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::{operator, Operator, OperatorUpdate};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

fn default_weight() -> i64 {
    1
}

/// Request to create an operator.
#[derive(Debug, Deserialize)]
pub struct CreateOperatorRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Operator>>> {
    Ok(Json(operator::list_operators(state.db.pool()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateOperatorRequest>,
) -> Result<(StatusCode, Json<Operator>)> {
    let created = operator::create_operator(
        state.db.pool(),
        &req.username,
        &req.display_name,
        &req.password,
        req.weight,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<OperatorUpdate>,
) -> Result<Json<Operator>> {
    Ok(Json(operator::update_operator(state.db.pool(), id, &update).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    operator::delete_operator(state.db.pool(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
