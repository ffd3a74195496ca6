//! Bounded trigger history, newest first, persisted as `triggerHistory`.

use std::sync::Arc;

use cockpit_types::TriggerRecord;
use parking_lot::Mutex;

use super::clock::Clock;
use super::collaborators::{load_blob, save_blob, StateStore};
use crate::error::AppResult;
use crate::modules::state_store::KEY_TRIGGER_HISTORY;

pub const MAX_HISTORY: usize = 40;
pub const MAX_HISTORY_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub struct TriggerHistory {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    records: Mutex<Vec<TriggerRecord>>,
    /// Held from snapshot to write so saves land in snapshot order.
    persist: tokio::sync::Mutex<()>,
}

impl TriggerHistory {
    pub async fn load(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let mut records: Vec<TriggerRecord> =
            load_blob(store.as_ref(), KEY_TRIGGER_HISTORY).await.unwrap_or_default();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        prune(&mut records, clock.now_ms());
        Self {
            store,
            clock,
            records: Mutex::new(records),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// Add a record, prune by count and age, and persist.
    pub async fn append(&self, record: TriggerRecord) -> AppResult<()> {
        {
            let mut records = self.records.lock();
            let pos = records.partition_point(|r| r.timestamp > record.timestamp);
            records.insert(pos, record);
            prune(&mut records, self.clock.now_ms());
        }
        self.persist().await
    }

    async fn persist(&self) -> AppResult<()> {
        let _persist = self.persist.lock().await;
        let snapshot = self.records.lock().clone();
        save_blob(self.store.as_ref(), KEY_TRIGGER_HISTORY, &snapshot).await
    }

    /// Newest first, at most `limit` records.
    pub fn recent(&self, limit: usize) -> Vec<TriggerRecord> {
        self.records.lock().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.records.lock().clear();
        self.persist().await
    }
}

fn prune(records: &mut Vec<TriggerRecord>, now_ms: i64) {
    records.retain(|r| now_ms - r.timestamp <= MAX_HISTORY_AGE_MS);
    records.truncate(MAX_HISTORY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record_at, FixedClock, MemoryStateStore};

    #[tokio::test]
    async fn test_append_caps_count_newest_first() {
        let clock = Arc::new(FixedClock::at("2024-01-10T00:00:00Z"));
        let store = Arc::new(MemoryStateStore::default());
        let history = TriggerHistory::load(store.clone(), clock.clone()).await;

        let base = clock.now_ms();
        for i in 0..45 {
            history.append(record_at(base - 45_000 + i * 1000)).await.unwrap();
        }

        assert_eq!(history.len(), MAX_HISTORY);
        let recent = history.recent(2);
        assert!(recent[0].timestamp > recent[1].timestamp);
        assert_eq!(recent[0].timestamp, base - 1000);

        let reloaded = TriggerHistory::load(store, clock).await;
        assert_eq!(reloaded.len(), MAX_HISTORY);
    }

    #[tokio::test]
    async fn test_old_records_are_dropped() {
        let clock = Arc::new(FixedClock::at("2024-01-10T00:00:00Z"));
        let history = TriggerHistory::load(Arc::new(MemoryStateStore::default()), clock.clone()).await;
        let now = clock.now_ms();

        history.append(record_at(now - MAX_HISTORY_AGE_MS - 1)).await.unwrap();
        history.append(record_at(now - MAX_HISTORY_AGE_MS)).await.unwrap();
        assert_eq!(history.len(), 1);

        history.clear().await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_appends_keep_both_records() {
        let clock = Arc::new(FixedClock::at("2024-01-10T00:00:00Z"));
        let store = Arc::new(MemoryStateStore::default());
        let history = TriggerHistory::load(store.clone(), clock.clone()).await;
        let now = clock.now_ms();

        // The first write is slow; the second must not be overwritten by it.
        store.delay_next_write(std::time::Duration::from_millis(50));
        let (first, second) =
            tokio::join!(history.append(record_at(now - 2000)), history.append(record_at(now - 1000)));
        first.unwrap();
        second.unwrap();

        let reloaded = TriggerHistory::load(store, clock).await;
        assert_eq!(reloaded.len(), 2);
    }
}
