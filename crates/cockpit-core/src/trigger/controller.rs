//! Owns the schedule and wires the engine together.
//!
//! Reset detection and calendar triggering are mutually exclusive: every
//! change cancels all timers before arming the ones the new schedule needs.

use std::sync::Arc;

use async_trait::async_trait;
use cockpit_types::{
    Account, AccountError, AccountSelection, ModelQuotaSnapshot, ScheduleConfig, ScheduleError,
    ScheduleMode, TriggerRecord, TriggerSource,
};
use futures::FutureExt;
use parking_lot::RwLock;

use super::clock::Clock;
use super::collaborators::{
    load_blob, require_token, save_blob, AccountDirectory, AccountStore, CalendarScheduler,
    FireCallback, KeepAliveTransport, ModelCatalogSource, StateNotifier, StateStore,
    TokenProvider,
};
use super::decision::ResetDecisionEngine;
use super::dispatcher::KeepAliveDispatcher;
use super::fallback::FallbackScheduler;
use super::history::TriggerHistory;
use super::mutation_queue::AccountMutationQueue;
use super::orchestrator::{PassOutcome, QuotaResetOrchestrator};
use super::runner::{resolve_accounts, BatchSpec, TriggerRunner};
use super::snapshot::{CockpitSnapshot, SharedSchedule, SnapshotPublisher};
use crate::error::{AppError, AppResult};
use crate::modules::catalog_cache::ModelCatalogCache;
use crate::modules::state_store::KEY_SCHEDULE_CONFIG;

/// Everything the controller talks to.
pub struct ControllerDeps {
    pub accounts: Arc<dyn AccountStore>,
    pub state: Arc<dyn StateStore>,
    pub tokens: Arc<dyn TokenProvider>,
    pub catalog: Arc<dyn ModelCatalogSource>,
    pub transport: Arc<dyn KeepAliveTransport>,
    pub calendar: Arc<dyn CalendarScheduler>,
    pub notifier: Arc<dyn StateNotifier>,
    pub clock: Arc<dyn Clock>,
    /// Disk cache for [`AutoTriggerController::available_models`]
    pub catalog_cache: Option<ModelCatalogCache>,
}

/// A user-initiated "test now" request.
#[derive(Debug, Clone, Default)]
pub struct ManualTrigger {
    pub models: Vec<String>,
    pub prompt: Option<String>,
    /// `None` targets the active account
    pub accounts: Option<Vec<String>>,
    pub max_output_tokens: Option<u32>,
}

/// Read-only view of an [`AccountStore`] for the parts that never mutate.
struct DirectoryView(Arc<dyn AccountStore>);

#[async_trait]
impl AccountDirectory for DirectoryView {
    async fn list_accounts(&self) -> AppResult<Vec<String>> {
        self.0.list_accounts().await
    }

    async fn get_active(&self) -> AppResult<Option<String>> {
        self.0.get_active().await
    }

    async fn get_credential(&self, email: &str) -> AppResult<Option<Account>> {
        self.0.get_credential(email).await
    }
}

pub struct AutoTriggerController {
    schedule: SharedSchedule,
    state: Arc<dyn StateStore>,
    accounts: Arc<dyn AccountStore>,
    directory: Arc<dyn AccountDirectory>,
    tokens: Arc<dyn TokenProvider>,
    catalog: Arc<dyn ModelCatalogSource>,
    catalog_cache: Option<ModelCatalogCache>,
    calendar: Arc<dyn CalendarScheduler>,
    fallback: FallbackScheduler,
    engine: Arc<ResetDecisionEngine>,
    history: Arc<TriggerHistory>,
    orchestrator: QuotaResetOrchestrator,
    runner: Arc<TriggerRunner>,
    publisher: Arc<SnapshotPublisher>,
    mutations: AccountMutationQueue,
}

impl AutoTriggerController {
    /// Load persisted state. Nothing is armed until [`Self::start`].
    pub async fn new(deps: ControllerDeps) -> Arc<Self> {
        let ControllerDeps {
            accounts,
            state,
            tokens,
            catalog,
            transport,
            calendar,
            notifier,
            clock,
            catalog_cache,
        } = deps;

        let config: ScheduleConfig =
            load_blob(state.as_ref(), KEY_SCHEDULE_CONFIG).await.unwrap_or_default();
        let schedule: SharedSchedule = Arc::new(RwLock::new(config));
        let directory: Arc<dyn AccountDirectory> = Arc::new(DirectoryView(Arc::clone(&accounts)));

        let engine = Arc::new(ResetDecisionEngine::load(Arc::clone(&state), Arc::clone(&clock)).await);
        let history = Arc::new(TriggerHistory::load(Arc::clone(&state), Arc::clone(&clock)).await);
        let dispatcher = Arc::new(KeepAliveDispatcher::new(
            transport,
            Arc::clone(&tokens),
            Arc::clone(&clock),
        ));
        let publisher = Arc::new(SnapshotPublisher::new(
            Arc::clone(&schedule),
            Arc::clone(&history),
            Arc::clone(&directory),
            Arc::clone(&calendar),
            Arc::clone(&clock),
            notifier,
        ));
        let runner = Arc::new(TriggerRunner::new(
            Arc::clone(&directory),
            Arc::clone(&dispatcher),
            Arc::clone(&history),
            Arc::clone(&publisher),
            Arc::clone(&clock),
        ));
        let orchestrator = QuotaResetOrchestrator::new(
            Arc::clone(&directory),
            Arc::clone(&tokens),
            Arc::clone(&catalog),
            Arc::clone(&engine),
            dispatcher,
            Arc::clone(&history),
            Arc::clone(&clock),
        );

        Arc::new(Self {
            schedule,
            state,
            accounts,
            directory,
            tokens,
            catalog,
            catalog_cache,
            calendar,
            fallback: FallbackScheduler::new(clock),
            engine,
            history,
            orchestrator,
            runner,
            publisher,
            mutations: AccountMutationQueue::new(),
        })
    }

    /// Arm timers for the persisted schedule.
    pub async fn start(&self) -> AppResult<()> {
        let config = self.schedule();
        tracing::info!("[AutoTrigger] Starting in {:?} mode", config.mode());
        self.apply(&config)?;
        self.publisher.publish().await;
        Ok(())
    }

    /// Cancel every timer, then arm the ones `config` needs.
    fn apply(&self, config: &ScheduleConfig) -> Result<(), ScheduleError> {
        self.calendar.stop();
        self.fallback.cancel();

        match config.mode() {
            ScheduleMode::Disabled => {
                tracing::info!("[AutoTrigger] Schedule disabled, all timers stopped");
            },
            ScheduleMode::QuotaReset => {
                if config.fallback_active() {
                    self.fallback.arm(config.clone(), self.runner.clone());
                }
                tracing::info!("[AutoTrigger] Reset detection armed");
            },
            ScheduleMode::Calendar => {
                self.calendar.set_schedule(config, self.fire_callback())?;
            },
        }
        Ok(())
    }

    /// Calendar fires read the schedule at fire time, so account cascades
    /// apply without re-arming.
    fn fire_callback(&self) -> FireCallback {
        let runner = Arc::clone(&self.runner);
        let schedule = Arc::clone(&self.schedule);
        Arc::new(move |source: TriggerSource| {
            let runner = Arc::clone(&runner);
            let config = schedule.read().clone();
            async move {
                if let Err(e) = runner.run_scheduled(&config, source).await {
                    tracing::error!("[Scheduler] Calendar trigger failed: {}", e);
                }
            }
            .boxed()
        })
    }

    /// Validate, persist and apply a new schedule.
    pub async fn save_schedule(&self, config: ScheduleConfig) -> AppResult<()> {
        config.check()?;
        if config.mode() == ScheduleMode::Calendar {
            let expr = self.calendar.config_to_crontab(&config)?;
            let validation = self.calendar.validate_crontab(&expr);
            if !validation.valid {
                return Err(ScheduleError::InvalidCrontab {
                    expr,
                    message: validation.error.unwrap_or_default(),
                }
                .into());
            }
        }

        // Queued with account mutations so a concurrent revoke cascade is
        // never overwritten by a save that started before it.
        self.mutations
            .run("save_schedule", || async {
                save_blob(self.state.as_ref(), KEY_SCHEDULE_CONFIG, &config)
                    .await
                    .map_err(|e| ScheduleError::WriteError { message: e.to_string() })?;
                *self.schedule.write() = config.clone();
                self.apply(&config)?;
                tracing::info!("[AutoTrigger] Schedule saved ({:?})", config.mode());
                self.publisher.publish().await;
                Ok::<(), AppError>(())
            })
            .await
    }

    /// Stop all timers. The saved schedule is left as is.
    pub fn stop(&self) {
        self.calendar.stop();
        self.fallback.cancel();
    }

    /// Fire right now, regardless of schedule or quota.
    pub async fn trigger_now(&self, request: ManualTrigger) -> AppResult<Vec<TriggerRecord>> {
        if request.models.is_empty() {
            return Err(ScheduleError::NoModelsSelected.into());
        }
        let selection = match request.accounts {
            Some(list) if list.is_empty() => return Err(ScheduleError::NoAccountsSelected.into()),
            Some(list) => AccountSelection::Explicit(list),
            None => AccountSelection::Unconfigured,
        };
        let accounts = resolve_accounts(self.directory.as_ref(), &selection).await?;
        if accounts.is_empty() {
            return Err(AccountError::NoAccounts.into());
        }

        tracing::info!("[AutoTrigger] Manual trigger for {} account(s)", accounts.len());
        let spec = BatchSpec {
            models: request.models,
            prompt: request.prompt,
            max_output_tokens: request.max_output_tokens,
            source: TriggerSource::Manual,
        };
        Ok(self.runner.run_batch(&accounts, &spec).await)
    }

    /// One reset-detection pass with the current schedule.
    pub async fn check_quota_reset(&self) -> PassOutcome {
        let config = self.schedule();
        let outcome = self.orchestrator.run_pass(&config).await;
        if !outcome.records().is_empty() {
            self.publisher.publish().await;
        }
        outcome
    }

    /// Remove an account and cascade into the schedule.
    ///
    /// Removing the last account disables the schedule. Otherwise the account
    /// is dropped from an explicit selection.
    pub async fn revoke_account(&self, email: &str) -> AppResult<()> {
        self.mutations
            .run("revoke", || async {
                if !self.accounts.remove(email).await? {
                    return Err(AccountError::NotFound { email: email.to_string() }.into());
                }
                tracing::info!(email = %email, "[Accounts] Account removed");

                let remaining = self.accounts.list_accounts().await?;
                let updated = {
                    let mut schedule = self.schedule.write();
                    let mut changed = schedule.selected_accounts.remove(email);
                    if remaining.is_empty() && schedule.enabled {
                        tracing::info!("[AutoTrigger] Last account removed, disabling schedule");
                        schedule.enabled = false;
                        changed = true;
                    }
                    changed.then(|| schedule.clone())
                };
                if let Some(config) = &updated {
                    save_blob(self.state.as_ref(), KEY_SCHEDULE_CONFIG, config).await?;
                }

                self.apply(&self.schedule())?;
                self.publisher.publish().await;
                Ok::<(), AppError>(())
            })
            .await
    }

    pub async fn switch_account(&self, email: &str) -> AppResult<()> {
        self.mutations
            .run("switch", || async {
                if !self.accounts.list_accounts().await?.iter().any(|e| e == email) {
                    return Err(AccountError::NotFound { email: email.to_string() }.into());
                }
                self.accounts.set_active(Some(email)).await?;
                tracing::info!(email = %email, "[Accounts] Active account switched");
                self.publisher.publish().await;
                Ok::<(), AppError>(())
            })
            .await
    }

    /// Add or replace an account, e.g. after a fresh sign-in.
    pub async fn import_account(&self, account: Account) -> AppResult<()> {
        self.mutations
            .run("import", || async {
                let email = account.email.clone();
                self.accounts.upsert(account).await?;
                tracing::info!(email = %email, "[Accounts] Account imported");
                self.publisher.publish().await;
                Ok::<(), AppError>(())
            })
            .await
    }

    /// Model catalog for an account, or the active one. Served from the disk
    /// cache when one is configured and fresh.
    pub async fn available_models(&self, email: Option<&str>) -> AppResult<Vec<ModelQuotaSnapshot>> {
        let email = match email {
            Some(email) => email.to_string(),
            None => resolve_accounts(self.directory.as_ref(), &AccountSelection::Unconfigured)
                .await?
                .into_iter()
                .next()
                .ok_or(AccountError::NoAccounts)?,
        };

        let fetch = async {
            let (token, project_id) = require_token(self.tokens.as_ref(), &email).await?;
            self.catalog.fetch_model_catalog(&token, project_id.as_deref(), None).await
        };
        match &self.catalog_cache {
            Some(cache) => cache.get_or_fetch(fetch).await,
            None => fetch.await,
        }
    }

    pub async fn snapshot(&self) -> CockpitSnapshot {
        self.publisher.build().await
    }

    pub fn history(&self, limit: usize) -> Vec<TriggerRecord> {
        self.history.recent(limit)
    }

    pub async fn clear_history(&self) -> AppResult<()> {
        self.history.clear().await?;
        tracing::info!("[AutoTrigger] History cleared");
        self.publisher.publish().await;
        Ok(())
    }

    pub fn schedule(&self) -> ScheduleConfig {
        self.schedule.read().clone()
    }

    /// Accounts the current schedule fires for.
    pub async fn scheduled_accounts(&self) -> AppResult<Vec<String>> {
        resolve_accounts(self.directory.as_ref(), &self.schedule().selected_accounts).await
    }

    pub fn is_checking(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn fallback(&self) -> &FallbackScheduler {
        &self.fallback
    }

    pub fn decision_engine(&self) -> &ResetDecisionEngine {
        &self.engine
    }

    /// Account mutations waiting for the queue.
    pub fn pending_mutations(&self) -> usize {
        self.mutations.pending()
    }
}

impl Drop for AutoTriggerController {
    fn drop(&mut self) {
        self.stop();
    }
}
