//! Automation settings routes.

use axum::extract::State;
use axum::Json;
use database::{settings, AutomationSettings, SettingsUpdate};

use crate::error::Result;
use crate::state::AppState;

pub async fn get(State(state): State<AppState>) -> Result<Json<AutomationSettings>> {
    Ok(Json(settings::get_settings(state.db.pool()).await?))
}

/// Replace the settings; the next reply attempt sees the new values.
pub async fn update(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<AutomationSettings>> {
    Ok(Json(settings::update_settings(state.db.pool(), &update).await?))
}
