#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::unwrap_used, reason = "integration test, panics are the assertion mechanism")]

use std::sync::Arc;
use std::time::Duration;

use cockpit_core::modules::state_store::{KEY_RESET_TIMESTAMPS, KEY_SCHEDULE_CONFIG};
use cockpit_core::test_support::{
    snapshot, AccountTokens, FixedClock, ManualCalendar, MemoryAccountStore, MemoryStateStore,
    RecordingNotifier, ScriptedTransport, StaticCatalog,
};
use cockpit_core::trigger::{ManualTrigger, PassOutcome};
use cockpit_core::{AutoTriggerController, ControllerDeps};
use cockpit_types::{
    AccountSelection, RepeatMode, ScheduleConfig, ScheduleMode, TrackedKey, TriggerSource,
    TriggerType,
};

struct Fixture {
    controller: Arc<AutoTriggerController>,
    accounts: Arc<MemoryAccountStore>,
    state: Arc<MemoryStateStore>,
    calendar: Arc<ManualCalendar>,
    notifier: Arc<RecordingNotifier>,
    catalog: Arc<StaticCatalog>,
    transport: Arc<ScriptedTransport>,
    clock: Arc<FixedClock>,
}

async fn fixture_with(accounts: MemoryAccountStore, state: Arc<MemoryStateStore>) -> Fixture {
    fixture_with_transport(accounts, state, ScriptedTransport::default()).await
}

async fn fixture_with_transport(
    accounts: MemoryAccountStore,
    state: Arc<MemoryStateStore>,
    transport: ScriptedTransport,
) -> Fixture {
    let accounts = Arc::new(accounts);
    let calendar = Arc::new(ManualCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let catalog = Arc::new(StaticCatalog::default());
    let transport = Arc::new(transport);
    let clock = Arc::new(FixedClock::at("2023-12-31T23:50:00Z"));

    let controller = AutoTriggerController::new(ControllerDeps {
        accounts: accounts.clone(),
        state: state.clone(),
        tokens: Arc::new(AccountTokens::default()),
        catalog: catalog.clone(),
        transport: transport.clone(),
        calendar: calendar.clone(),
        notifier: notifier.clone(),
        clock: clock.clone(),
        catalog_cache: None,
    })
    .await;

    Fixture { controller, accounts, state, calendar, notifier, catalog, transport, clock }
}

async fn fixture(emails: &[&str]) -> Fixture {
    fixture_with(MemoryAccountStore::with_emails(emails), Arc::new(MemoryStateStore::default()))
        .await
}

fn reset_schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        wake_on_reset: true,
        repeat_mode: RepeatMode::QuotaReset,
        selected_models: vec!["gemini-3-flash".to_string()],
        ..Default::default()
    }
}

fn daily_schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        repeat_mode: RepeatMode::Daily,
        daily_times: vec!["08:00".to_string()],
        selected_models: vec!["gemini-3-flash".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_invalid_schedule_is_rejected_and_not_persisted() {
    let f = fixture(&["a@x.com"]).await;

    let no_models = ScheduleConfig { selected_models: vec![], ..daily_schedule() };
    let err = f.controller.save_schedule(no_models).await.unwrap_err();
    assert!(err.is_configuration());

    let bad_cron = ScheduleConfig {
        repeat_mode: RepeatMode::Crontab,
        crontab: Some("61 * * * *".to_string()),
        ..daily_schedule()
    };
    let err = f.controller.save_schedule(bad_cron).await.unwrap_err();
    assert!(err.is_configuration());

    assert!(f.state.raw(KEY_SCHEDULE_CONFIG).is_none());
    assert_eq!(f.calendar.sets(), 0);
}

#[tokio::test]
async fn test_modes_are_mutually_exclusive() {
    let f = fixture(&["a@x.com"]).await;

    f.controller.save_schedule(daily_schedule()).await.unwrap();
    assert!(f.calendar.is_set());
    assert!(!f.controller.fallback().is_armed());

    let windowed = ScheduleConfig {
        time_window_enabled: true,
        time_window_start: Some("08:00".to_string()),
        time_window_end: Some("20:00".to_string()),
        fallback_times: vec!["07:00".to_string()],
        ..reset_schedule()
    };
    f.controller.save_schedule(windowed).await.unwrap();
    assert!(!f.calendar.is_set());
    assert!(f.controller.fallback().is_armed());
    assert_eq!(f.controller.snapshot().await.mode, ScheduleMode::QuotaReset);

    f.controller.save_schedule(ScheduleConfig::default()).await.unwrap();
    assert!(!f.calendar.is_set());
    assert!(!f.controller.fallback().is_armed());
}

#[tokio::test]
async fn test_calendar_fire_records_scheduled_batch() {
    let f = fixture(&["a@x.com", "b@x.com"]).await;
    f.controller.save_schedule(daily_schedule()).await.unwrap();
    let published = f.notifier.count();

    assert!(f.calendar.fire(TriggerSource::Scheduled).await);

    let history = f.controller.history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trigger_source, TriggerSource::Scheduled);
    assert_eq!(history[0].trigger_type, TriggerType::Auto);
    assert_eq!(history[0].account_email.as_deref(), Some("a@x.com"));
    assert!(f.notifier.count() > published);
}

#[tokio::test]
async fn test_manual_trigger() {
    let f = fixture(&["a@x.com", "b@x.com"]).await;

    let records = f
        .controller
        .trigger_now(ManualTrigger {
            models: vec!["m1".to_string(), "m2".to_string()],
            prompt: Some("ping".to_string()),
            accounts: Some(vec!["a@x.com".to_string(), "b@x.com".to_string()]),
            max_output_tokens: None,
        })
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.trigger_type == TriggerType::Manual));
    assert_eq!(f.transport.calls(), 4);
    assert!(f.transport.prompts().iter().all(|p| p == "ping"));

    let err = f.controller.trigger_now(ManualTrigger::default()).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_reset_scenario_end_to_end() {
    let f = fixture(&["a@x.com"]).await;
    f.controller.save_schedule(reset_schedule()).await.unwrap();
    f.catalog.set("a@x.com", vec![snapshot("gemini-3-flash", 1.0, "2024-01-01T00:00:00Z")]);

    let outcome = f.controller.check_quota_reset().await;
    assert_eq!(outcome.records().len(), 1);
    assert!(f.state.raw(KEY_RESET_TIMESTAMPS).is_some());
    let key = TrackedKey::new("a@x.com", "gemini-3-flash");
    assert_eq!(
        f.controller.decision_engine().last_reset_at(&key).as_deref(),
        Some("2024-01-01T00:00:00Z")
    );

    f.clock.set("2024-01-01T00:01:30Z");
    let outcome = f.controller.check_quota_reset().await;
    assert!(matches!(outcome, PassOutcome::Completed { ref records, .. } if records.is_empty()));

    f.clock.set("2024-01-01T00:03:00Z");
    f.catalog.set("a@x.com", vec![snapshot("gemini-3-flash", 1.0, "2024-01-02T00:00:00Z")]);
    let outcome = f.controller.check_quota_reset().await;
    assert_eq!(outcome.records().len(), 1);

    let history = f.controller.history(10);
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.trigger_source == TriggerSource::QuotaReset));
    assert_eq!(f.notifier.last().unwrap().history.len(), 2);
}

#[tokio::test]
async fn test_schedule_survives_restart() {
    let state = Arc::new(MemoryStateStore::default());
    let first = fixture_with(MemoryAccountStore::with_emails(&["a@x.com"]), state.clone()).await;
    first.controller.save_schedule(daily_schedule()).await.unwrap();
    drop(first);

    let second = fixture_with(MemoryAccountStore::with_emails(&["a@x.com"]), state).await;
    assert_eq!(second.controller.schedule(), daily_schedule());
    assert!(!second.calendar.is_set());

    second.controller.start().await.unwrap();
    assert!(second.calendar.is_set());
}

#[tokio::test]
async fn test_revoking_last_account_disables_schedule() {
    let f = fixture(&["a@x.com"]).await;
    f.controller.save_schedule(daily_schedule()).await.unwrap();

    f.controller.revoke_account("a@x.com").await.unwrap();

    assert!(!f.controller.schedule().enabled);
    assert!(!f.calendar.is_set());
    let persisted: ScheduleConfig =
        serde_json::from_value(f.state.raw(KEY_SCHEDULE_CONFIG).unwrap()).unwrap();
    assert!(!persisted.enabled);

    let err = f.controller.revoke_account("a@x.com").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_revoke_drops_account_from_selection() {
    let f = fixture(&["a@x.com", "b@x.com"]).await;
    let schedule = ScheduleConfig {
        selected_accounts: AccountSelection::Explicit(vec![
            "a@x.com".to_string(),
            "b@x.com".to_string(),
        ]),
        ..daily_schedule()
    };
    f.controller.save_schedule(schedule).await.unwrap();

    f.controller.revoke_account("a@x.com").await.unwrap();

    let schedule = f.controller.schedule();
    assert!(schedule.enabled);
    assert_eq!(schedule.selected_accounts, AccountSelection::Explicit(vec!["b@x.com".to_string()]));
    assert!(f.calendar.is_set());
    assert_eq!(f.controller.snapshot().await.accounts, vec!["b@x.com"]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_revokes_run_in_order() {
    let accounts = MemoryAccountStore::with_emails(&["a@x.com", "b@x.com", "c@x.com"])
        .with_remove_delay(Duration::from_millis(50));
    let f = fixture_with(accounts, Arc::new(MemoryStateStore::default())).await;

    let (first, second) = tokio::join!(
        f.controller.revoke_account("a@x.com"),
        f.controller.revoke_account("b@x.com"),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(
        f.accounts.ops(),
        vec!["start:remove:a@x.com", "end:remove:a@x.com", "start:remove:b@x.com", "end:remove:b@x.com"]
    );
    assert_eq!(f.accounts.emails(), vec!["c@x.com"]);
    assert_eq!(f.controller.pending_mutations(), 0);
}

#[tokio::test]
async fn test_switch_account() {
    let f = fixture(&["a@x.com", "b@x.com"]).await;

    f.controller.switch_account("b@x.com").await.unwrap();
    assert_eq!(f.controller.snapshot().await.active_account.as_deref(), Some("b@x.com"));

    let err = f.controller.switch_account("ghost@x.com").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_save_racing_last_revoke_ends_disabled() {
    let f = fixture(&["a@x.com"]).await;
    f.state.delay_next_write(Duration::from_millis(50));

    let (saved, revoked) =
        tokio::join!(f.controller.save_schedule(daily_schedule()), f.controller.revoke_account("a@x.com"));
    saved.unwrap();
    revoked.unwrap();

    assert!(!f.controller.schedule().enabled);
    assert!(!f.calendar.is_set());
    let persisted: ScheduleConfig =
        serde_json::from_value(f.state.raw(KEY_SCHEDULE_CONFIG).unwrap()).unwrap();
    assert!(!persisted.enabled);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_fallback_fire_keeps_record() {
    let f = fixture_with_transport(
        MemoryAccountStore::with_emails(&["a@x.com"]),
        Arc::new(MemoryStateStore::default()),
        ScriptedTransport::default().with_delay(Duration::from_secs(5)),
    )
    .await;
    let config = ScheduleConfig {
        time_window_enabled: true,
        time_window_start: Some("08:00".to_string()),
        time_window_end: Some("22:00".to_string()),
        fallback_times: vec!["07:00".to_string()],
        ..reset_schedule()
    };
    f.controller.save_schedule(config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(f.controller.fallback().is_armed());

    // 23:50 to 07:00 is 7h10m; land one second into the 5 s send.
    f.clock.set("2024-01-01T07:00:00Z");
    tokio::time::sleep(Duration::from_secs(7 * 3600 + 10 * 60 + 1)).await;
    assert_eq!(f.transport.calls(), 1);
    assert!(f.controller.history(10).is_empty());

    f.controller.stop();
    assert!(!f.controller.fallback().is_armed());
    tokio::time::sleep(Duration::from_secs(60)).await;

    let history = f.controller.history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trigger_source, TriggerSource::Scheduled);
}
