//! Narrow interfaces the trigger engine consumes.
//!
//! Production implementations live in [`crate::modules`]; in-memory fakes live
//! in `test_support`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use cockpit_types::{
    Account, AccountError, DispatchError, ModelQuotaSnapshot, ScheduleConfig, ScheduleError,
    TokenState, TokenStatus, TokenUsage, TriggerSource,
};

use super::snapshot::CockpitSnapshot;
use crate::error::AppResult;

/// Read side of the credential store.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Emails in display order.
    async fn list_accounts(&self) -> AppResult<Vec<String>>;

    async fn get_active(&self) -> AppResult<Option<String>>;

    async fn get_credential(&self, email: &str) -> AppResult<Option<Account>>;
}

/// Mutations of the credential store. Callers serialize these through
/// [`super::AccountMutationQueue`].
#[async_trait]
pub trait AccountStore: AccountDirectory {
    async fn set_active(&self, email: Option<&str>) -> AppResult<()>;

    /// Insert or replace an account, matched by email.
    async fn upsert(&self, account: Account) -> AppResult<()>;

    /// Returns `false` when no such account existed.
    async fn remove(&self, email: &str) -> AppResult<bool>;
}

/// Keyed JSON blob persistence.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_value(&self, key: &str) -> AppResult<Option<serde_json::Value>>;

    async fn set_value(&self, key: &str, value: serde_json::Value) -> AppResult<()>;
}

/// Load a typed blob. Missing or unreadable blobs come back as `None`.
pub async fn load_blob<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    match store.get_value(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("[State] Ignoring unreadable '{}': {}", key, e);
                None
            },
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("[State] Failed to read '{}': {}", key, e);
            None
        },
    }
}

pub async fn save_blob<T: Serialize + Sync>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> AppResult<()> {
    store.set_value(key, serde_json::to_value(value)?).await
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_access_token_status(&self, email: &str) -> AppResult<TokenStatus>;
}

/// Access token and project for an account, or the authorization error that
/// ends this account's work.
pub async fn require_token(
    tokens: &dyn TokenProvider,
    email: &str,
) -> AppResult<(String, Option<String>)> {
    let status = tokens.get_access_token_status(email).await?;
    if let Some(token) = status.usable_token() {
        return Ok((token.to_string(), status.project_id.clone()));
    }
    let email = email.to_string();
    let err = match status.state {
        TokenState::Expired => AccountError::TokenExpired { email },
        TokenState::InvalidGrant => AccountError::InvalidGrant { email },
        TokenState::RefreshFailed => {
            AccountError::TokenRefreshFailed { email, message: "token refresh failed".to_string() }
        },
        TokenState::Ok => AccountError::TokenUnavailable { email },
    };
    Err(err.into())
}

/// Model catalog with live quota levels.
#[async_trait]
pub trait ModelCatalogSource: Send + Sync {
    async fn fetch_model_catalog(
        &self,
        access_token: &str,
        project_id: Option<&str>,
        filter_ids: Option<&[String]>,
    ) -> AppResult<Vec<ModelQuotaSnapshot>>;
}

/// One keep-alive request for one model.
#[derive(Debug, Clone)]
pub struct KeepAliveRequest<'a> {
    pub access_token: &'a str,
    pub project_id: Option<&'a str>,
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_output_tokens: Option<u32>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeepAliveReply {
    pub reply_text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait KeepAliveTransport: Send + Sync {
    async fn send_keep_alive(
        &self,
        request: KeepAliveRequest<'_>,
    ) -> Result<KeepAliveReply, DispatchError>;
}

/// Invoked by the calendar scheduler on every matching minute.
pub type FireCallback = Arc<dyn Fn(TriggerSource) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl CrontabValidation {
    pub const fn ok() -> Self {
        Self { valid: true, error: None }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self { valid: false, error: Some(error.into()) }
    }
}

/// Calendar-driven triggering (daily, weekly, interval, crontab).
pub trait CalendarScheduler: Send + Sync {
    /// Replace any running schedule with this one.
    fn set_schedule(&self, config: &ScheduleConfig, on_fire: FireCallback)
        -> Result<(), ScheduleError>;

    /// Idempotent.
    fn stop(&self);

    fn describe(&self, config: &ScheduleConfig) -> String;

    fn config_to_crontab(&self, config: &ScheduleConfig) -> Result<String, ScheduleError>;

    fn validate_crontab(&self, expr: &str) -> CrontabValidation;
}

/// One-way push of state to the UI. Must not block.
pub trait StateNotifier: Send + Sync {
    fn publish(&self, snapshot: CockpitSnapshot);
}

/// Notifier that drops every snapshot.
pub struct NoopNotifier;

impl StateNotifier for NoopNotifier {
    fn publish(&self, _snapshot: CockpitSnapshot) {}
}
