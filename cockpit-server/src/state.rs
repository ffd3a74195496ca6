//! Application State
//!
//! Holds the auto-trigger controller and the latest published snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use cockpit_core::modules::account::JsonAccountStore;
use cockpit_core::modules::catalog_cache::ModelCatalogCache;
use cockpit_core::modules::cloudcode::CloudCodeClient;
use cockpit_core::modules::paths;
use cockpit_core::modules::state_store::JsonStateStore;
use cockpit_core::modules::token::StoredTokenProvider;
use cockpit_core::trigger::{
    Clock, CockpitSnapshot, CronCalendarScheduler, StateNotifier, SystemClock,
};
use cockpit_core::{AutoTriggerController, ControllerDeps};

/// Keeps only the newest snapshot; readers never block the engine.
pub struct WatchNotifier {
    tx: watch::Sender<Option<CockpitSnapshot>>,
}

impl WatchNotifier {
    pub fn channel() -> (Arc<Self>, watch::Receiver<Option<CockpitSnapshot>>) {
        let (tx, rx) = watch::channel(None);
        (Arc::new(Self { tx }), rx)
    }
}

impl StateNotifier for WatchNotifier {
    fn publish(&self, snapshot: CockpitSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub controller: Arc<AutoTriggerController>,
    pub snapshots: watch::Receiver<Option<CockpitSnapshot>>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Wire the controller to the file stores under `data_dir` and the live
    /// Cloud Code API. Timers are not armed until the controller is started.
    pub async fn open(data_dir: PathBuf) -> Result<Self> {
        paths::ensure_dir(&data_dir).map_err(anyhow::Error::msg)?;

        let accounts = Arc::new(JsonAccountStore::new(data_dir.clone()));
        let state_store = Arc::new(JsonStateStore::open(&data_dir).await?);
        let client = Arc::new(CloudCodeClient::new()?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (notifier, snapshots) = WatchNotifier::channel();

        let controller = AutoTriggerController::new(ControllerDeps {
            accounts: accounts.clone(),
            state: state_store,
            tokens: Arc::new(StoredTokenProvider::new(accounts)),
            catalog: client.clone(),
            transport: client,
            calendar: Arc::new(CronCalendarScheduler::new()),
            notifier,
            clock: clock.clone(),
            catalog_cache: Some(ModelCatalogCache::new(&data_dir, clock)),
        })
        .await;

        Ok(Self::from_parts(controller, snapshots, data_dir))
    }

    pub fn from_parts(
        controller: Arc<AutoTriggerController>,
        snapshots: watch::Receiver<Option<CockpitSnapshot>>,
        data_dir: PathBuf,
    ) -> Self {
        Self { inner: Arc::new(AppStateInner { controller, snapshots, data_dir }) }
    }

    pub fn controller(&self) -> &AutoTriggerController {
        &self.inner.controller
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    /// Last published snapshot, or a fresh one before the first publish.
    pub async fn snapshot(&self) -> CockpitSnapshot {
        let latest = self.inner.snapshots.borrow().clone();
        match latest {
            Some(snapshot) => snapshot,
            None => self.controller().snapshot().await,
        }
    }
}
