//! State snapshots pushed to the UI notifier.

use std::sync::Arc;

use chrono::TimeDelta;
use cockpit_types::{ScheduleConfig, ScheduleMode, TriggerRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::collaborators::{AccountDirectory, CalendarScheduler, StateNotifier};
use super::fallback::next_fallback_delay;
use super::history::{TriggerHistory, MAX_HISTORY};

/// The live schedule, shared by the controller and everything that reads it.
pub type SharedSchedule = Arc<RwLock<ScheduleConfig>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CockpitSnapshot {
    pub schedule: ScheduleConfig,
    pub mode: ScheduleMode,
    /// Human summary of the schedule
    pub description: String,
    /// Epoch ms of the next fallback fire, when fallback timers are armed
    pub next_fallback_at: Option<i64>,
    pub accounts: Vec<String>,
    pub active_account: Option<String>,
    pub history: Vec<TriggerRecord>,
    /// Epoch ms
    pub updated_at: i64,
}

pub struct SnapshotPublisher {
    schedule: SharedSchedule,
    history: Arc<TriggerHistory>,
    accounts: Arc<dyn AccountDirectory>,
    calendar: Arc<dyn CalendarScheduler>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn StateNotifier>,
}

impl SnapshotPublisher {
    pub fn new(
        schedule: SharedSchedule,
        history: Arc<TriggerHistory>,
        accounts: Arc<dyn AccountDirectory>,
        calendar: Arc<dyn CalendarScheduler>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn StateNotifier>,
    ) -> Self {
        Self { schedule, history, accounts, calendar, clock, notifier }
    }

    pub async fn build(&self) -> CockpitSnapshot {
        let schedule = self.schedule.read().clone();
        let mode = schedule.mode();
        let description = match mode {
            ScheduleMode::Disabled => "Disabled".to_string(),
            ScheduleMode::QuotaReset => describe_quota_reset(&schedule),
            ScheduleMode::Calendar => self.calendar.describe(&schedule),
        };

        let now = self.clock.now_utc();
        let next_fallback_at = if schedule.fallback_active() {
            next_fallback_delay(&schedule.fallback_minutes(), self.clock.now_local_time())
                .and_then(|d| TimeDelta::from_std(d).ok())
                .map(|d| (now + d).timestamp_millis())
        } else {
            None
        };

        let accounts = self.accounts.list_accounts().await.unwrap_or_else(|e| {
            tracing::warn!("[AutoTrigger] Failed to list accounts for snapshot: {}", e);
            Vec::new()
        });
        let active_account = self.accounts.get_active().await.ok().flatten();

        CockpitSnapshot {
            schedule,
            mode,
            description,
            next_fallback_at,
            accounts,
            active_account,
            history: self.history.recent(MAX_HISTORY),
            updated_at: now.timestamp_millis(),
        }
    }

    pub async fn publish(&self) {
        let snapshot = self.build().await;
        self.notifier.publish(snapshot);
    }
}

fn describe_quota_reset(config: &ScheduleConfig) -> String {
    let mut text = "On quota reset".to_string();
    if config.has_time_window() {
        if let (Some(start), Some(end)) = (&config.time_window_start, &config.time_window_end) {
            text.push_str(&format!(" between {} and {}", start, end));
        }
        if !config.fallback_times.is_empty() {
            text.push_str(&format!(", fallback at {}", config.fallback_times.join(", ")));
        }
    }
    text
}
