//! Reset detection: decides whether a quota reset deserves a keep-alive fire.
//!
//! Two watermarks per (account, model), both persisted:
//! - reset watermark: the `reset_at` that last caused a fire (`lastResetTriggerTimestamps`)
//! - cooldown watermark: when that fire happened, epoch ms (`lastResetTriggerAt`)

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration};
use parking_lot::Mutex;

use super::clock::Clock;
use super::collaborators::{load_blob, save_blob, StateStore};
use crate::error::AppResult;
use crate::models::TrackedKey;
use crate::modules::state_store::{KEY_RESET_TIMESTAMPS, KEY_RESET_TRIGGER_AT};

/// Minimum time after the previously fired reset instant before firing again.
pub const SAFETY_MARGIN: Duration = Duration::minutes(2);
/// Minimum time between two fires for the same key.
pub const COOLDOWN: Duration = Duration::minutes(10);

#[derive(Debug, Default)]
struct Watermarks {
    reset_at: HashMap<String, String>,
    fired_at: HashMap<String, i64>,
}

pub struct ResetDecisionEngine {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    watermarks: Mutex<Watermarks>,
    persist: tokio::sync::Mutex<()>,
}

impl ResetDecisionEngine {
    /// Load both watermark maps from the state store.
    pub async fn load(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let reset_at = load_blob(store.as_ref(), KEY_RESET_TIMESTAMPS).await.unwrap_or_default();
        let fired_at = load_blob(store.as_ref(), KEY_RESET_TRIGGER_AT).await.unwrap_or_default();
        Self {
            store,
            clock,
            watermarks: Mutex::new(Watermarks { reset_at, fired_at }),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// All four must hold: quota is full, the previous reset is at least
    /// [`SAFETY_MARGIN`] in the past, [`COOLDOWN`] has elapsed since the last
    /// fire, and this reset instant has not fired before.
    pub fn should_fire(
        &self,
        key: &TrackedKey,
        candidate_reset_at: &str,
        remaining: f64,
        limit: f64,
    ) -> bool {
        if remaining < limit {
            return false;
        }

        let id = key.to_string();
        let now = self.clock.now_utc();
        let marks = self.watermarks.lock();

        if let Some(last_reset) = marks.reset_at.get(&id) {
            if last_reset == candidate_reset_at {
                return false;
            }
            if let Ok(last_reset) = DateTime::parse_from_rfc3339(last_reset) {
                if now < last_reset + SAFETY_MARGIN {
                    return false;
                }
            }
        }

        if let Some(fired_at) = marks.fired_at.get(&id) {
            if now.timestamp_millis() - fired_at < COOLDOWN.num_milliseconds() {
                return false;
            }
        }

        true
    }

    /// Record a fire decision. The in-memory watermarks change before this
    /// awaits, so a concurrent decision for the same key already sees them.
    pub async fn mark_fired(&self, key: &TrackedKey, reset_at: &str) -> AppResult<()> {
        let id = key.to_string();
        let now_ms = self.clock.now_ms();
        {
            let mut marks = self.watermarks.lock();
            marks.reset_at.insert(id.clone(), reset_at.to_string());
            marks.fired_at.insert(id, now_ms);
        }

        // Snapshot only once the write lock is held, so a later save never
        // carries older maps than an earlier one.
        let _persist = self.persist.lock().await;
        let (reset_at_map, fired_at_map) = {
            let marks = self.watermarks.lock();
            (marks.reset_at.clone(), marks.fired_at.clone())
        };
        save_blob(self.store.as_ref(), KEY_RESET_TIMESTAMPS, &reset_at_map).await?;
        save_blob(self.store.as_ref(), KEY_RESET_TRIGGER_AT, &fired_at_map).await?;
        Ok(())
    }

    pub fn last_reset_at(&self, key: &TrackedKey) -> Option<String> {
        self.watermarks.lock().reset_at.get(&key.to_string()).cloned()
    }

    pub fn last_fired_at(&self, key: &TrackedKey) -> Option<i64> {
        self.watermarks.lock().fired_at.get(&key.to_string()).copied()
    }
}
