//! Automation log route.

use axum::extract::{Query, State};
use axum::Json;
use database::{automation_log, AutomationLogEntry};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub conversation_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Most recent reply attempts, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<AutomationLogEntry>>> {
    let entries = automation_log::list_logs(
        state.db.pool(),
        query.conversation_id,
        query.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(entries))
}
