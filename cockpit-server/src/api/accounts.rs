//! Account handlers: list, switch, remove

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub email: String,
    pub is_current: bool,
    /// Whether scheduled triggers reach this account
    pub is_scheduled: bool,
}

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountInfo>>, (StatusCode, String)> {
    let controller = state.controller();
    let snapshot = controller.snapshot().await;
    let scheduled = controller.scheduled_accounts().await.map_err(error_response)?;

    let infos = snapshot
        .accounts
        .iter()
        .map(|email| AccountInfo {
            email: email.clone(),
            is_current: snapshot.active_account.as_deref() == Some(email.as_str()),
            is_scheduled: scheduled.contains(email),
        })
        .collect();
    Ok(Json(infos))
}

#[derive(Debug, Deserialize)]
pub struct SwitchAccountRequest {
    pub email: String,
}

pub async fn switch_account(
    State(state): State<AppState>,
    Json(payload): Json<SwitchAccountRequest>,
) -> Result<Json<bool>, (StatusCode, String)> {
    state.controller().switch_account(&payload.email).await.map_err(error_response)?;
    Ok(Json(true))
}

/// Removing the last account also disables the schedule.
pub async fn remove_account(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<bool>, (StatusCode, String)> {
    state.controller().revoke_account(&email).await.map_err(error_response)?;
    Ok(Json(true))
}
