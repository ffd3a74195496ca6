//! Test helpers for cockpit-server unit tests.

use std::sync::Arc;

use tempfile::TempDir;

use cockpit_core::test_support::{
    AccountTokens, FixedClock, ManualCalendar, MemoryAccountStore, MemoryStateStore,
    ScriptedTransport, StaticCatalog,
};
use cockpit_core::{AutoTriggerController, ControllerDeps};

use crate::state::{AppState, WatchNotifier};

pub struct TestApp {
    pub state: AppState,
    pub accounts: Arc<MemoryAccountStore>,
    pub catalog: Arc<StaticCatalog>,
    pub transport: Arc<ScriptedTransport>,
    _tmp: TempDir,
}

/// `AppState` over in-memory fakes with the given accounts.
pub async fn test_app_state(emails: &[&str]) -> TestApp {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let accounts = Arc::new(MemoryAccountStore::with_emails(emails));
    let catalog = Arc::new(StaticCatalog::default());
    let transport = Arc::new(ScriptedTransport::default());
    let (notifier, snapshots) = WatchNotifier::channel();

    let controller = AutoTriggerController::new(ControllerDeps {
        accounts: accounts.clone(),
        state: Arc::new(MemoryStateStore::default()),
        tokens: Arc::new(AccountTokens::default()),
        catalog: catalog.clone(),
        transport: transport.clone(),
        calendar: Arc::new(ManualCalendar::default()),
        notifier,
        clock: Arc::new(FixedClock::at("2024-01-01T00:05:00Z")),
        catalog_cache: None,
    })
    .await;

    let state = AppState::from_parts(controller, snapshots, tmp.path().to_path_buf());
    TestApp { state, accounts, catalog, transport, _tmp: tmp }
}
