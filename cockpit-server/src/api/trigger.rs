//! Trigger handlers: manual trigger, reset check, history, model catalog

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use cockpit_core::trigger::history::MAX_HISTORY;
use cockpit_core::trigger::{ManualTrigger, PassOutcome};
use cockpit_types::{ModelQuotaSnapshot, TriggerRecord};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub models: Vec<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Omitted means the active account
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

pub async fn trigger_now(
    State(state): State<AppState>,
    Json(payload): Json<TriggerRequest>,
) -> Result<Json<Vec<TriggerRecord>>, (StatusCode, String)> {
    let request = ManualTrigger {
        models: payload.models,
        prompt: payload.prompt,
        accounts: payload.accounts,
        max_output_tokens: payload.max_output_tokens,
    };
    let records = state.controller().trigger_now(request).await.map_err(error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaCheckResponse {
    /// Why the pass did not run, if it did not
    pub skipped: Option<String>,
    pub records: Vec<TriggerRecord>,
    pub failed_accounts: Vec<String>,
}

impl From<PassOutcome> for QuotaCheckResponse {
    fn from(outcome: PassOutcome) -> Self {
        match outcome {
            PassOutcome::Skipped(reason) => Self {
                skipped: Some(format!("{:?}", reason)),
                records: Vec::new(),
                failed_accounts: Vec::new(),
            },
            PassOutcome::Completed { records, failed_accounts } => {
                Self { skipped: None, records, failed_accounts }
            },
        }
    }
}

pub async fn check_quota_reset(State(state): State<AppState>) -> Json<QuotaCheckResponse> {
    Json(state.controller().check_quota_reset().await.into())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<TriggerRecord>> {
    let limit = query.limit.unwrap_or(MAX_HISTORY);
    Json(state.controller().history(limit))
}

pub async fn clear_history(
    State(state): State<AppState>,
) -> Result<Json<bool>, (StatusCode, String)> {
    state.controller().clear_history().await.map_err(error_response)?;
    Ok(Json(true))
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub email: Option<String>,
}

pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Vec<ModelQuotaSnapshot>>, (StatusCode, String)> {
    let models = state
        .controller()
        .available_models(query.email.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(models))
}
