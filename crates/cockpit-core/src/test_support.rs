//! In-memory fakes for the trigger engine's collaborators.
//!
//! Compiled for unit tests and behind the `test-support` feature for the
//! integration tests in `tests/`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::Mutex;

use cockpit_types::{
    Account, DispatchError, ModelQuotaSnapshot, ScheduleConfig, ScheduleError,
    TokenData, TokenState, TokenStatus, TokenUsage, TriggerRecord, TriggerSource,
};

use crate::error::AppResult;
use crate::trigger::calendar;
use crate::trigger::{
    AccountDirectory, AccountStore, CalendarScheduler, Clock, CockpitSnapshot, CrontabValidation,
    FireCallback, KeepAliveReply, KeepAliveRequest, KeepAliveTransport, ModelCatalogSource,
    StateNotifier, StateStore, TokenProvider,
};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Settable clock. Local time of day equals the UTC time of day.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Panics on anything that is not RFC 3339.
    pub fn at(rfc3339: &str) -> Self {
        Self { now: Mutex::new(parse_instant(rfc3339)) }
    }

    pub fn set(&self, rfc3339: &str) {
        *self.now.lock() = parse_instant(rfc3339);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

fn parse_instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap_or_else(|e| panic!("bad instant {s}: {e}")).with_timezone(&Utc)
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn now_local_time(&self) -> NaiveTime {
        self.now.lock().time()
    }
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    fail_writes: Mutex<bool>,
    next_write_delay: Mutex<Option<Duration>>,
}

impl MemoryStateStore {
    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: serde_json::Value) {
        self.values.lock().insert(key.to_string(), value);
    }

    /// Make every later `set_value` fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Hold the next `set_value` for `delay` before it lands.
    pub fn delay_next_write(&self, delay: Duration) {
        *self.next_write_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_value(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        Ok(self.raw(key))
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> AppResult<()> {
        if *self.fail_writes.lock() {
            return Err(std::io::Error::other("disk full").into());
        }
        let delay = self.next_write_delay.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.put(key, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AccountsInner {
    accounts: Vec<Account>,
    active: Option<String>,
}

/// Account store with an operation log and an optional slow `remove`.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: Mutex<AccountsInner>,
    remove_delay: Mutex<Option<Duration>>,
    ops: Mutex<Vec<String>>,
}

pub fn test_account(email: &str) -> Account {
    Account::new(
        email.to_string(),
        TokenData::new(format!("tok-{email}"), "refresh".to_string(), 3600, None),
    )
}

impl MemoryAccountStore {
    /// Accounts in the given order; the first one is active.
    pub fn with_emails(emails: &[&str]) -> Self {
        let store = Self::default();
        for email in emails {
            store.insert(test_account(email));
        }
        store
    }

    /// Insert or replace synchronously. The first account becomes active.
    pub fn insert(&self, account: Account) {
        let mut inner = self.inner.lock();
        if inner.active.is_none() {
            inner.active = Some(account.email.clone());
        }
        match inner.accounts.iter_mut().find(|a| a.email == account.email) {
            Some(existing) => *existing = account,
            None => inner.accounts.push(account),
        }
    }

    pub fn force_active(&self, email: Option<&str>) {
        self.inner.lock().active = email.map(str::to_string);
    }

    pub fn with_remove_delay(self, delay: Duration) -> Self {
        *self.remove_delay.lock() = Some(delay);
        self
    }

    /// `start:<op>` / `end:<op>` entries in the order they happened.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn emails(&self) -> Vec<String> {
        self.inner.lock().accounts.iter().map(|a| a.email.clone()).collect()
    }

    fn log(&self, entry: String) {
        self.ops.lock().push(entry);
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountStore {
    async fn list_accounts(&self) -> AppResult<Vec<String>> {
        Ok(self.emails())
    }

    async fn get_active(&self) -> AppResult<Option<String>> {
        Ok(self.inner.lock().active.clone())
    }

    async fn get_credential(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self.inner.lock().accounts.iter().find(|a| a.email == email).cloned())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn set_active(&self, email: Option<&str>) -> AppResult<()> {
        self.log(format!("set_active:{}", email.unwrap_or("-")));
        self.force_active(email);
        Ok(())
    }

    async fn upsert(&self, account: Account) -> AppResult<()> {
        self.log(format!("upsert:{}", account.email));
        self.insert(account);
        Ok(())
    }

    async fn remove(&self, email: &str) -> AppResult<bool> {
        self.log(format!("start:remove:{email}"));
        let delay = *self.remove_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let removed = {
            let mut inner = self.inner.lock();
            let before = inner.accounts.len();
            inner.accounts.retain(|a| a.email != email);
            let removed = inner.accounts.len() != before;
            if inner.active.as_deref() == Some(email) {
                inner.active = inner.accounts.first().map(|a| a.email.clone());
            }
            removed
        };
        self.log(format!("end:remove:{email}"));
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Same status for every account unless overridden per email.
#[derive(Debug)]
pub struct StaticTokens {
    default: TokenStatus,
    overrides: Mutex<HashMap<String, TokenStatus>>,
}

impl StaticTokens {
    pub fn ok(token: &str) -> Self {
        Self::with_default(TokenStatus::ok(token.to_string(), None))
    }

    pub fn expired() -> Self {
        Self::with_default(TokenStatus::failed(TokenState::Expired))
    }

    fn with_default(default: TokenStatus) -> Self {
        Self { default, overrides: Mutex::new(HashMap::new()) }
    }

    pub fn set(&self, email: &str, status: TokenStatus) {
        self.overrides.lock().insert(email.to_string(), status);
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn get_access_token_status(&self, email: &str) -> AppResult<TokenStatus> {
        Ok(self.overrides.lock().get(email).cloned().unwrap_or_else(|| self.default.clone()))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Reply(KeepAliveReply),
    Fail(DispatchError),
    Hang,
}

/// Keep-alive transport with per-model scripted outcomes. Unscripted models
/// reply "ok" without usage.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    delay: Option<Duration>,
    sent: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply(&self, model: &str, text: &str, usage: Option<(u64, u64)>) {
        let usage = usage.map(|(prompt, completion)| TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        });
        let reply = KeepAliveReply { reply_text: text.to_string(), usage };
        self.scripts.lock().insert(model.to_string(), Script::Reply(reply));
    }

    pub fn fail(&self, model: &str, error: DispatchError) {
        self.scripts.lock().insert(model.to_string(), Script::Fail(error));
    }

    /// Never answer for this model.
    pub fn hang(&self, model: &str) {
        self.scripts.lock().insert(model.to_string(), Script::Hang);
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().len()
    }

    /// Models in the order requests started.
    pub fn models(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(model, _)| model.clone()).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, prompt)| prompt.clone()).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeepAliveTransport for ScriptedTransport {
    async fn send_keep_alive(
        &self,
        request: KeepAliveRequest<'_>,
    ) -> Result<KeepAliveReply, DispatchError> {
        self.sent.lock().push((request.model.to_string(), request.prompt.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.scripts.lock().get(request.model).cloned();
        match script {
            Some(Script::Reply(reply)) => Ok(reply),
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Hang) => std::future::pending().await,
            None => Ok(KeepAliveReply { reply_text: "ok".to_string(), usage: None }),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Per-account catalogs. Accounts without one get an empty catalog.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    by_token: Mutex<BTreeMap<String, Vec<ModelQuotaSnapshot>>>,
    fetches: AtomicUsize,
}

impl StaticCatalog {
    /// Catalog served for `email`, keyed by the token [`test_account`] issues.
    pub fn set(&self, email: &str, models: Vec<ModelQuotaSnapshot>) {
        self.by_token.lock().insert(format!("tok-{email}"), models);
    }

    /// Catalog served for any access token without its own entry.
    pub fn set_default(&self, models: Vec<ModelQuotaSnapshot>) {
        self.by_token.lock().insert(String::new(), models);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelCatalogSource for StaticCatalog {
    async fn fetch_model_catalog(
        &self,
        access_token: &str,
        _project_id: Option<&str>,
        filter_ids: Option<&[String]>,
    ) -> AppResult<Vec<ModelQuotaSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let catalogs = self.by_token.lock();
        let models = catalogs.get(access_token).or_else(|| catalogs.get("")).cloned().unwrap_or_default();
        Ok(match filter_ids {
            Some(ids) => models.into_iter().filter(|m| ids.iter().any(|id| m.matches(id))).collect(),
            None => models,
        })
    }
}

/// Account-aware tokens: each known account gets `tok-<email>`.
#[derive(Default)]
pub struct AccountTokens {
    failures: Mutex<HashMap<String, TokenState>>,
}

impl AccountTokens {
    pub fn fail(&self, email: &str, state: TokenState) {
        self.failures.lock().insert(email.to_string(), state);
    }
}

#[async_trait]
impl TokenProvider for AccountTokens {
    async fn get_access_token_status(&self, email: &str) -> AppResult<TokenStatus> {
        if let Some(state) = self.failures.lock().get(email) {
            return Ok(TokenStatus::failed(*state));
        }
        Ok(TokenStatus::ok(format!("tok-{email}"), None))
    }
}

// ---------------------------------------------------------------------------
// Notifier and calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    snapshots: Mutex<Vec<CockpitSnapshot>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn last(&self) -> Option<CockpitSnapshot> {
        self.snapshots.lock().last().cloned()
    }
}

impl StateNotifier for RecordingNotifier {
    fn publish(&self, snapshot: CockpitSnapshot) {
        self.snapshots.lock().push(snapshot);
    }
}

/// Calendar that never ticks on its own; tests call [`ManualCalendar::fire`].
#[derive(Default)]
pub struct ManualCalendar {
    callback: Mutex<Option<FireCallback>>,
    sets: AtomicUsize,
    stops: AtomicUsize,
}

impl ManualCalendar {
    pub fn is_set(&self) -> bool {
        self.callback.lock().is_some()
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Run the armed callback once. Returns `false` when nothing is armed.
    pub async fn fire(&self, source: TriggerSource) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(source).await;
                true
            },
            None => false,
        }
    }
}

impl CalendarScheduler for ManualCalendar {
    fn set_schedule(
        &self,
        config: &ScheduleConfig,
        on_fire: FireCallback,
    ) -> Result<(), ScheduleError> {
        let expr = calendar::config_to_crontab(config)?;
        let validation = calendar::validate_crontab(&expr);
        if !validation.valid {
            return Err(ScheduleError::InvalidCrontab {
                expr,
                message: validation.error.unwrap_or_default(),
            });
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock() = Some(on_fire);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock() = None;
    }

    fn describe(&self, config: &ScheduleConfig) -> String {
        calendar::describe(config)
    }

    fn config_to_crontab(&self, config: &ScheduleConfig) -> Result<String, ScheduleError> {
        calendar::config_to_crontab(config)
    }

    fn validate_crontab(&self, expr: &str) -> CrontabValidation {
        calendar::validate_crontab(expr)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn snapshot(id: &str, fraction: f64, reset: &str) -> ModelQuotaSnapshot {
    ModelQuotaSnapshot {
        id: id.to_string(),
        model_constant: None,
        display_name: None,
        remaining_fraction: Some(fraction),
        reset_time: Some(reset.to_string()),
    }
}

pub fn record_at(timestamp: i64) -> TriggerRecord {
    TriggerRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        success: true,
        prompt: "[m] hi".to_string(),
        message: "✅ m".to_string(),
        duration_ms: 1,
        token_usage: None,
        trigger_type: TriggerSource::Manual.trigger_type(),
        trigger_source: TriggerSource::Manual,
        account_email: Some("a@x.com".to_string()),
    }
}
