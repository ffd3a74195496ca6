//! Schedule handlers: read and replace the auto-trigger schedule

use axum::{extract::State, http::StatusCode, response::Json};

use cockpit_core::trigger::CockpitSnapshot;
use cockpit_types::ScheduleConfig;

use super::error_response;
use crate::state::AppState;

pub async fn get_schedule(State(state): State<AppState>) -> Json<ScheduleConfig> {
    Json(state.controller().schedule())
}

/// Validate, persist and apply. Returns the snapshot after the change.
pub async fn save_schedule(
    State(state): State<AppState>,
    Json(config): Json<ScheduleConfig>,
) -> Result<Json<CockpitSnapshot>, (StatusCode, String)> {
    state.controller().save_schedule(config).await.map_err(error_response)?;
    Ok(Json(state.controller().snapshot().await))
}
