use std::sync::Arc;
use std::time::Duration;

use cockpit_types::{AccountSelection, ModelQuotaSnapshot, RepeatMode, ScheduleConfig, TokenState};

use super::decision::ResetDecisionEngine;
use super::dispatcher::KeepAliveDispatcher;
use super::history::TriggerHistory;
use super::orchestrator::{PassOutcome, QuotaResetOrchestrator, SkipReason};
use crate::test_support::{
    snapshot, AccountTokens, FixedClock, MemoryAccountStore, MemoryStateStore, ScriptedTransport,
    StaticCatalog,
};

const FLASH: &str = "gemini-3-flash";
const RESET_1: &str = "2024-01-01T00:00:00Z";
const RESET_2: &str = "2024-01-01T05:00:00Z";

struct Harness {
    orchestrator: QuotaResetOrchestrator,
    tokens: Arc<AccountTokens>,
    catalog: Arc<StaticCatalog>,
    transport: Arc<ScriptedTransport>,
    clock: Arc<FixedClock>,
    history: Arc<TriggerHistory>,
}

async fn harness(emails: &[&str], at: &str, transport: ScriptedTransport) -> Harness {
    let clock = Arc::new(FixedClock::at(at));
    let state = Arc::new(MemoryStateStore::default());
    let accounts = Arc::new(MemoryAccountStore::with_emails(emails));
    let tokens = Arc::new(AccountTokens::default());
    let catalog = Arc::new(StaticCatalog::default());
    let transport = Arc::new(transport);

    let engine = Arc::new(ResetDecisionEngine::load(state.clone(), clock.clone()).await);
    let history = Arc::new(TriggerHistory::load(state, clock.clone()).await);
    let dispatcher =
        Arc::new(KeepAliveDispatcher::new(transport.clone(), tokens.clone(), clock.clone()));
    let orchestrator = QuotaResetOrchestrator::new(
        accounts,
        tokens.clone(),
        catalog.clone(),
        engine,
        dispatcher,
        history.clone(),
        clock.clone(),
    );
    Harness { orchestrator, tokens, catalog, transport, clock, history }
}

fn reset_config(models: &[&str]) -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        wake_on_reset: true,
        repeat_mode: RepeatMode::QuotaReset,
        selected_models: models.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

fn with_constant(mut model: ModelQuotaSnapshot, constant: &str) -> ModelQuotaSnapshot {
    model.model_constant = Some(constant.to_string());
    model
}

#[tokio::test]
async fn test_fires_once_per_reset() {
    let h = harness(&["a@x.com"], "2023-12-31T23:50:00Z", ScriptedTransport::default()).await;
    let config = reset_config(&[FLASH]);
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 1.0, RESET_1)]);

    let outcome = h.orchestrator.run_pass(&config).await;
    assert_eq!(outcome.records().len(), 1);
    let record = &outcome.records()[0];
    assert!(record.success);
    assert_eq!(record.account_email.as_deref(), Some("a@x.com"));
    assert_eq!(h.transport.models(), vec![FLASH]);
    assert_eq!(h.history.len(), 1);

    // Same reset seen again: nothing new.
    h.clock.set("2024-01-01T00:01:30Z");
    let outcome = h.orchestrator.run_pass(&config).await;
    assert!(outcome.records().is_empty());
    assert_eq!(h.transport.calls(), 1);

    // Next reset after margin and cooldown.
    h.clock.set("2024-01-01T00:03:00Z");
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 1.0, RESET_2)]);
    let outcome = h.orchestrator.run_pass(&config).await;
    assert_eq!(outcome.records().len(), 1);
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test]
async fn test_partial_quota_and_missing_reset_are_ignored() {
    let h = harness(&["a@x.com"], "2024-01-01T00:05:00Z", ScriptedTransport::default()).await;
    let mut no_reset = snapshot("gemini-3-pro", 1.0, RESET_1);
    no_reset.reset_time = None;
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 0.6, RESET_1), no_reset]);

    let outcome = h.orchestrator.run_pass(&reset_config(&[FLASH, "gemini-3-pro"])).await;
    assert_eq!(
        outcome,
        PassOutcome::Completed { records: vec![], failed_accounts: vec![] }
    );
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test]
async fn test_model_addressed_twice_fires_once() {
    let h = harness(&["a@x.com"], "2024-01-01T00:05:00Z", ScriptedTransport::default()).await;
    h.catalog.set(
        "a@x.com",
        vec![with_constant(snapshot(FLASH, 1.0, RESET_1), "MODEL_PLACEHOLDER_M18")],
    );

    let outcome = h.orchestrator.run_pass(&reset_config(&[FLASH, "MODEL_PLACEHOLDER_M18"])).await;
    assert_eq!(outcome.records().len(), 1);
    assert_eq!(h.transport.models(), vec![FLASH]);
}

#[tokio::test]
async fn test_outside_window_skips_without_fetching() {
    let h = harness(&["a@x.com"], "2024-01-01T06:00:00Z", ScriptedTransport::default()).await;
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 1.0, RESET_1)]);
    let config = ScheduleConfig {
        time_window_enabled: true,
        time_window_start: Some("08:00".to_string()),
        time_window_end: Some("20:00".to_string()),
        ..reset_config(&[FLASH])
    };

    let outcome = h.orchestrator.run_pass(&config).await;
    assert_eq!(outcome, PassOutcome::Skipped(SkipReason::OutsideWindow));
    assert_eq!(h.catalog.fetches(), 0);

    h.clock.set("2024-01-01T08:00:00Z");
    assert_eq!(h.orchestrator.run_pass(&config).await.records().len(), 1);
}

#[tokio::test]
async fn test_only_reset_mode_runs() {
    let h = harness(&["a@x.com"], "2024-01-01T00:05:00Z", ScriptedTransport::default()).await;

    let disabled = ScheduleConfig { enabled: false, ..reset_config(&[FLASH]) };
    assert_eq!(
        h.orchestrator.run_pass(&disabled).await,
        PassOutcome::Skipped(SkipReason::NotEnabled)
    );

    let calendar = ScheduleConfig {
        wake_on_reset: false,
        repeat_mode: RepeatMode::Daily,
        daily_times: vec!["08:00".to_string()],
        ..reset_config(&[FLASH])
    };
    assert_eq!(
        h.orchestrator.run_pass(&calendar).await,
        PassOutcome::Skipped(SkipReason::NotEnabled)
    );
}

#[tokio::test]
async fn test_explicit_empty_selection_has_no_accounts() {
    let h = harness(&["a@x.com"], "2024-01-01T00:05:00Z", ScriptedTransport::default()).await;
    let config = ScheduleConfig {
        selected_accounts: AccountSelection::Explicit(vec![]),
        ..reset_config(&[FLASH])
    };
    assert_eq!(
        h.orchestrator.run_pass(&config).await,
        PassOutcome::Skipped(SkipReason::NoAccounts)
    );
}

#[tokio::test]
async fn test_auth_failure_only_skips_that_account() {
    let h = harness(&["a@x.com", "b@x.com"], "2024-01-01T00:05:00Z", ScriptedTransport::default())
        .await;
    h.tokens.fail("a@x.com", TokenState::InvalidGrant);
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 1.0, RESET_1)]);
    h.catalog.set("b@x.com", vec![snapshot(FLASH, 1.0, RESET_1)]);
    let config = ScheduleConfig {
        selected_accounts: AccountSelection::Explicit(vec![
            "a@x.com".to_string(),
            "b@x.com".to_string(),
        ]),
        ..reset_config(&[FLASH])
    };

    let PassOutcome::Completed { records, failed_accounts } = h.orchestrator.run_pass(&config).await
    else {
        panic!("pass should complete");
    };
    assert_eq!(failed_accounts, vec!["a@x.com"]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].account_email.as_deref(), Some("b@x.com"));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_pass_is_skipped() {
    let transport = ScriptedTransport::default().with_delay(Duration::from_millis(50));
    let h = harness(&["a@x.com"], "2024-01-01T00:05:00Z", transport).await;
    h.catalog.set("a@x.com", vec![snapshot(FLASH, 1.0, RESET_1)]);
    let config = reset_config(&[FLASH]);

    let (first, second) =
        tokio::join!(h.orchestrator.run_pass(&config), h.orchestrator.run_pass(&config));

    assert_eq!(first.records().len(), 1);
    assert_eq!(second, PassOutcome::Skipped(SkipReason::AlreadyRunning));
    assert!(!h.orchestrator.is_running());
    assert_eq!(h.transport.calls(), 1);
}
