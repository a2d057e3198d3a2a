//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Whether the database answered a trivial query.
    pub database: bool,
}

/// Report liveness. The process is up whenever this answers; a failed
/// database probe is reported but does not change the status code.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = database::settings::get_settings(state.db.pool()).await.is_ok();
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}
