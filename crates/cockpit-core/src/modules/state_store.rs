//! Key/value state file (`cockpit_state.json`).
//!
//! Holds the persisted keys of the trigger engine: `triggerHistory`,
//! `lastResetTriggerTimestamps`, `lastResetTriggerAt` and `scheduleConfig`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::paths::{write_atomic, STATE_FILE};
use crate::error::AppResult;
use crate::trigger::StateStore;

pub const KEY_TRIGGER_HISTORY: &str = "triggerHistory";
pub const KEY_RESET_TIMESTAMPS: &str = "lastResetTriggerTimestamps";
pub const KEY_RESET_TRIGGER_AT: &str = "lastResetTriggerAt";
pub const KEY_SCHEDULE_CONFIG: &str = "scheduleConfig";

/// JSON file of named blobs, cached in memory and rewritten atomically on every set.
pub struct JsonStateStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonStateStore {
    /// Open `<data_dir>/cockpit_state.json`. A missing or corrupt file starts empty.
    pub async fn open(data_dir: &Path) -> AppResult<Self> {
        let path = data_dir.join(STATE_FILE);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        "[State] State file {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    Map::new()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data: Mutex::new(data) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get_value(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: Value) -> AppResult<()> {
        let mut data = self.data.lock().await;
        data.insert(key.to_string(), value);
        let content = serde_json::to_vec_pretty(&*data)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &content)).await??;
        Ok(())
    }
}
