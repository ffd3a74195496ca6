//! Background reset-check loop.
//!
//! Ticks every `check_interval` seconds and runs one reset-detection pass
//! while the schedule is in reset mode. Calendar timers run inside the
//! controller and need nothing here.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use cockpit_core::trigger::PassOutcome;
use cockpit_types::ScheduleMode;

use crate::state::AppState;

/// Lower bound on the check interval.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(10);

pub fn start_quota_check(state: AppState, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_CHECK_INTERVAL);
    tokio::spawn(async move {
        tracing::info!("[QuotaCheck] Reset check loop started (every {}s)", every.as_secs());

        let mut check_interval = interval(every);
        check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            check_interval.tick().await;

            let controller = state.controller();
            if controller.schedule().mode() != ScheduleMode::QuotaReset {
                continue;
            }
            if controller.is_checking() {
                tracing::debug!("[QuotaCheck] Previous pass still running");
                continue;
            }

            match controller.check_quota_reset().await {
                PassOutcome::Skipped(reason) => {
                    tracing::debug!("[QuotaCheck] Pass skipped: {:?}", reason);
                },
                PassOutcome::Completed { records, failed_accounts } => {
                    if !failed_accounts.is_empty() {
                        tracing::warn!(
                            "[QuotaCheck] {} account(s) failed: {}",
                            failed_accounts.len(),
                            failed_accounts.join(", ")
                        );
                    }
                    if !records.is_empty() {
                        tracing::info!("[QuotaCheck] Fired {} keep-alive batch(es)", records.len());
                    }
                },
            }
        }
    })
}
