//! One reset-detection pass over the selected accounts and models.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cockpit_types::{ScheduleConfig, ScheduleMode, TrackedKey, TriggerRecord, TriggerSource};

use super::clock::Clock;
use super::collaborators::{require_token, AccountDirectory, ModelCatalogSource, TokenProvider};
use super::decision::ResetDecisionEngine;
use super::dispatcher::{DispatchRequest, KeepAliveDispatcher};
use super::history::TriggerHistory;
use super::runner::resolve_accounts;
use super::time_window::config_window_contains;
use crate::error::AppResult;

/// Reset detection fires only when the whole quota is back.
pub const FULL_QUOTA_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    NotEnabled,
    OutsideWindow,
    NoAccounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Skipped(SkipReason),
    Completed {
        /// One per account that had at least one model to fire
        records: Vec<TriggerRecord>,
        /// Accounts whose pass ended in an error
        failed_accounts: Vec<String>,
    },
}

impl PassOutcome {
    pub fn records(&self) -> &[TriggerRecord] {
        match self {
            Self::Completed { records, .. } => records,
            Self::Skipped(_) => &[],
        }
    }
}

/// Resets the running flag when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct QuotaResetOrchestrator {
    accounts: Arc<dyn AccountDirectory>,
    tokens: Arc<dyn TokenProvider>,
    catalog: Arc<dyn ModelCatalogSource>,
    engine: Arc<ResetDecisionEngine>,
    dispatcher: Arc<KeepAliveDispatcher>,
    history: Arc<TriggerHistory>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

impl QuotaResetOrchestrator {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        tokens: Arc<dyn TokenProvider>,
        catalog: Arc<dyn ModelCatalogSource>,
        engine: Arc<ResetDecisionEngine>,
        dispatcher: Arc<KeepAliveDispatcher>,
        history: Arc<TriggerHistory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            tokens,
            catalog,
            engine,
            dispatcher,
            history,
            clock,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one pass. A pass already in progress makes this a no-op.
    pub async fn run_pass(&self, config: &ScheduleConfig) -> PassOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("[AutoTrigger] Reset check already running, skipping");
            return PassOutcome::Skipped(SkipReason::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        if config.mode() != ScheduleMode::QuotaReset {
            return PassOutcome::Skipped(SkipReason::NotEnabled);
        }
        if !config_window_contains(config, self.clock.now_local_minutes()) {
            tracing::debug!("[AutoTrigger] Outside time window, skipping reset check");
            return PassOutcome::Skipped(SkipReason::OutsideWindow);
        }

        let accounts = match resolve_accounts(self.accounts.as_ref(), &config.selected_accounts).await {
            Ok(accounts) if !accounts.is_empty() => accounts,
            Ok(_) => return PassOutcome::Skipped(SkipReason::NoAccounts),
            Err(e) => {
                tracing::error!("[AutoTrigger] Failed to resolve accounts: {}", e);
                return PassOutcome::Skipped(SkipReason::NoAccounts);
            },
        };

        let mut records = Vec::new();
        let mut failed_accounts = Vec::new();
        for email in &accounts {
            match self.check_account(email, config).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(email = %email, "[AutoTrigger] Reset check failed: {}", e);
                    failed_accounts.push(email.clone());
                },
            }
        }

        if !records.is_empty() {
            tracing::info!("[AutoTrigger] Reset check fired {} batch(es)", records.len());
        }
        PassOutcome::Completed { records, failed_accounts }
    }

    async fn check_account(
        &self,
        email: &str,
        config: &ScheduleConfig,
    ) -> AppResult<Option<TriggerRecord>> {
        let (token, project_id) = require_token(self.tokens.as_ref(), email).await?;
        let catalog = self
            .catalog
            .fetch_model_catalog(&token, project_id.as_deref(), Some(config.selected_models.as_slice()))
            .await?;

        let mut fire_set: Vec<String> = Vec::new();
        for selected in &config.selected_models {
            let Some(snapshot) = catalog.iter().find(|m| m.matches(selected)) else {
                tracing::debug!(email = %email, "[AutoTrigger] Model {} not in catalog", selected);
                continue;
            };
            let (Some(remaining), Some(reset_at)) =
                (snapshot.remaining_percent(), snapshot.reset_time.as_deref())
            else {
                continue;
            };
            if !snapshot.has_reset_data() || fire_set.contains(&snapshot.id) {
                continue;
            }

            let key = TrackedKey::new(email, snapshot.tracking_id());
            if !self.engine.should_fire(&key, reset_at, remaining, FULL_QUOTA_PERCENT) {
                continue;
            }
            tracing::info!(
                email = %email,
                "[AutoTrigger] {} reset detected (resets at {})",
                snapshot.label(),
                reset_at
            );
            if let Err(e) = self.engine.mark_fired(&key, reset_at).await {
                tracing::error!("[AutoTrigger] Failed to persist watermark for {}: {}", key, e);
            }
            fire_set.push(snapshot.id.clone());
        }

        if fire_set.is_empty() {
            return Ok(None);
        }

        let record = self
            .dispatcher
            .dispatch(DispatchRequest {
                models: fire_set,
                prompt: config.custom_prompt.clone(),
                account_email: email.to_string(),
                max_output_tokens: config.max_output_tokens,
                source: TriggerSource::QuotaReset,
            })
            .await?;
        if let Err(e) = self.history.append(record.clone()).await {
            tracing::error!("[AutoTrigger] Failed to persist history: {}", e);
        }
        Ok(Some(record))
    }
}
