//! Batches for manual, calendar and fallback triggers.
//!
//! Unlike the reset orchestrator, these fire unconditionally for every
//! resolved account and always leave a record, failed or not.

use std::sync::Arc;

use async_trait::async_trait;
use cockpit_types::{AccountSelection, ScheduleConfig, TriggerRecord, TriggerSource};

use super::clock::Clock;
use super::collaborators::AccountDirectory;
use super::dispatcher::{DispatchRequest, KeepAliveDispatcher};
use super::fallback::FallbackSink;
use super::history::TriggerHistory;
use super::snapshot::SnapshotPublisher;
use crate::error::{AppError, AppResult};

/// Accounts a schedule applies to.
///
/// An explicit selection wins, even when empty. Only a selection that was
/// never configured falls back to the active account, else the first one.
pub async fn resolve_accounts(
    directory: &dyn AccountDirectory,
    selection: &AccountSelection,
) -> AppResult<Vec<String>> {
    let known = directory.list_accounts().await?;
    match selection {
        AccountSelection::Explicit(list) => {
            let (present, missing): (Vec<String>, Vec<String>) =
                list.iter().cloned().partition(|email| known.contains(email));
            if !missing.is_empty() {
                tracing::warn!("[AutoTrigger] Selected accounts no longer exist: {}", missing.join(", "));
            }
            Ok(present)
        },
        AccountSelection::Unconfigured => {
            let active = directory.get_active().await?.filter(|email| known.contains(email));
            Ok(active.or_else(|| known.first().cloned()).into_iter().collect())
        },
    }
}

/// Record for a batch that never reached the transport.
pub fn failed_record(
    request: &DispatchRequest,
    error: &AppError,
    timestamp: i64,
) -> TriggerRecord {
    TriggerRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        success: false,
        prompt: format!("[{}]", request.models.join(", ")),
        message: format!("❌ {}", error),
        duration_ms: 0,
        token_usage: None,
        trigger_type: request.source.trigger_type(),
        trigger_source: request.source,
        account_email: Some(request.account_email.clone()),
    }
}

#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub models: Vec<String>,
    pub prompt: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub source: TriggerSource,
}

impl BatchSpec {
    pub fn from_config(config: &ScheduleConfig, source: TriggerSource) -> Self {
        Self {
            models: config.selected_models.clone(),
            prompt: config.custom_prompt.clone(),
            max_output_tokens: config.max_output_tokens,
            source,
        }
    }
}

pub struct TriggerRunner {
    accounts: Arc<dyn AccountDirectory>,
    dispatcher: Arc<KeepAliveDispatcher>,
    history: Arc<TriggerHistory>,
    publisher: Arc<SnapshotPublisher>,
    clock: Arc<dyn Clock>,
}

impl TriggerRunner {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        dispatcher: Arc<KeepAliveDispatcher>,
        history: Arc<TriggerHistory>,
        publisher: Arc<SnapshotPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { accounts, dispatcher, history, publisher, clock }
    }

    /// One dispatch per account, in order. Every account yields a record.
    pub async fn run_batch(&self, accounts: &[String], spec: &BatchSpec) -> Vec<TriggerRecord> {
        let mut records = Vec::with_capacity(accounts.len());
        for email in accounts {
            let request = DispatchRequest {
                models: spec.models.clone(),
                prompt: spec.prompt.clone(),
                account_email: email.clone(),
                max_output_tokens: spec.max_output_tokens,
                source: spec.source,
            };
            let record = match self.dispatcher.dispatch(request.clone()).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(email = %email, "[AutoTrigger] {} trigger failed: {}", spec.source, e);
                    failed_record(&request, &e, self.clock.now_ms())
                },
            };
            if let Err(e) = self.history.append(record.clone()).await {
                tracing::error!("[AutoTrigger] Failed to persist history: {}", e);
            }
            records.push(record);
        }
        self.publisher.publish().await;
        records
    }

    /// Fire a schedule's models at its resolved accounts.
    pub async fn run_scheduled(
        &self,
        config: &ScheduleConfig,
        source: TriggerSource,
    ) -> AppResult<Vec<TriggerRecord>> {
        let accounts = resolve_accounts(self.accounts.as_ref(), &config.selected_accounts).await?;
        if accounts.is_empty() {
            tracing::info!("[AutoTrigger] {} trigger skipped: no accounts", source);
            return Ok(Vec::new());
        }
        tracing::info!("[AutoTrigger] {} trigger for {} account(s)", source, accounts.len());
        Ok(self.run_batch(&accounts, &BatchSpec::from_config(config, source)).await)
    }
}

#[async_trait]
impl FallbackSink for TriggerRunner {
    async fn fire_fallback(&self, config: &ScheduleConfig) {
        if let Err(e) = self.run_scheduled(config, TriggerSource::Scheduled).await {
            tracing::error!("[Fallback] Fallback trigger failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryAccountStore;

    fn store(emails: &[&str], active: Option<&str>) -> MemoryAccountStore {
        let store = MemoryAccountStore::with_emails(emails);
        store.force_active(active);
        store
    }

    #[tokio::test]
    async fn test_explicit_empty_selects_nothing() {
        let store = store(&["a@x", "b@x"], Some("b@x"));
        let selected = resolve_accounts(&store, &AccountSelection::Explicit(vec![])).await.unwrap();
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_list_wins_and_drops_unknown() {
        let store = store(&["a@x", "b@x"], Some("b@x"));
        let selection = AccountSelection::Explicit(vec!["a@x".to_string(), "ghost@x".to_string()]);
        assert_eq!(resolve_accounts(&store, &selection).await.unwrap(), vec!["a@x"]);
    }

    #[tokio::test]
    async fn test_unconfigured_prefers_active_then_first() {
        let store = store(&["a@x", "b@x"], Some("b@x"));
        assert_eq!(
            resolve_accounts(&store, &AccountSelection::Unconfigured).await.unwrap(),
            vec!["b@x"]
        );

        store.force_active(None);
        assert_eq!(
            resolve_accounts(&store, &AccountSelection::Unconfigured).await.unwrap(),
            vec!["a@x"]
        );

        let empty = MemoryAccountStore::default();
        assert!(resolve_accounts(&empty, &AccountSelection::Unconfigured).await.unwrap().is_empty());
    }
}
