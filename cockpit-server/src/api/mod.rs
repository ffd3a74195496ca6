//! API Routes
//!
//! REST endpoints mirroring the controller operations the UI and CLI use.

mod accounts;
mod schedule;
mod trigger;

#[cfg(test)]
mod accounts_tests;
#[cfg(test)]
mod schedule_tests;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};

use cockpit_core::trigger::CockpitSnapshot;
use cockpit_core::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // State
        .route("/state", get(get_state))
        // Schedule
        .route("/schedule", get(schedule::get_schedule).put(schedule::save_schedule))
        // Triggers
        .route("/trigger", post(trigger::trigger_now))
        .route("/quota-check", post(trigger::check_quota_reset))
        .route("/history", get(trigger::get_history).delete(trigger::clear_history))
        .route("/models", get(trigger::list_models))
        // Accounts
        .route("/accounts", get(accounts::list_accounts))
        .route("/accounts/switch", post(accounts::switch_account))
        .route("/accounts/:email", delete(accounts::remove_account))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

async fn get_state(State(state): State<AppState>) -> Json<CockpitSnapshot> {
    Json(state.snapshot().await)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Unknown API endpoint")
}

/// Map controller errors onto HTTP status codes.
pub(crate) fn error_response(e: AppError) -> (StatusCode, String) {
    let status = if e.is_configuration() {
        StatusCode::BAD_REQUEST
    } else if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else if e.is_authorization() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}
