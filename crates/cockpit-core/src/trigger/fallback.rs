//! Fallback timers for reset detection with a time window.
//!
//! Outside the window no resets are acted on, so fixed "HH:MM" fallback times
//! fire keep-alives instead. Exactly one one-shot timer is armed at a time;
//! after it fires it arms the next one. Cancelling stops future fires only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Timelike};
use cockpit_types::models::minutes_to_hhmm;
use cockpit_types::ScheduleConfig;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::time_window::config_window_contains;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Receives fallback fires that land outside the time window.
#[async_trait]
pub trait FallbackSink: Send + Sync {
    async fn fire_fallback(&self, config: &ScheduleConfig);
}

/// Next fallback minute strictly after `now`'s minute, wrapping to the first
/// time of the next day. `fallback_minutes` must be sorted.
pub fn next_fallback_minute(fallback_minutes: &[u32], now: NaiveTime) -> Option<u32> {
    let now_minutes = now.hour() * 60 + now.minute();
    fallback_minutes
        .iter()
        .copied()
        .find(|m| *m > now_minutes)
        .or_else(|| fallback_minutes.first().copied())
}

/// Delay from `now` until the next fallback time.
pub fn next_fallback_delay(fallback_minutes: &[u32], now: NaiveTime) -> Option<Duration> {
    let target = u64::from(next_fallback_minute(fallback_minutes, now)?) * 60;
    let now_secs = u64::from(now.num_seconds_from_midnight());
    let secs = if target > now_secs { target - now_secs } else { target + SECS_PER_DAY - now_secs };
    Some(Duration::from_secs(secs))
}

struct ArmedTimer {
    handle: JoinHandle<()>,
}

pub struct FallbackScheduler {
    clock: Arc<dyn Clock>,
    armed: Mutex<Option<ArmedTimer>>,
    next_minute: Arc<Mutex<Option<u32>>>,
    arms: Arc<AtomicU64>,
}

impl FallbackScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            armed: Mutex::new(None),
            next_minute: Arc::new(Mutex::new(None)),
            arms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel any armed timer, then arm for `config` when fallback applies.
    pub fn arm(&self, config: ScheduleConfig, sink: Arc<dyn FallbackSink>) {
        self.cancel();
        if !config.fallback_active() {
            return;
        }

        let clock = Arc::clone(&self.clock);
        let next_minute = Arc::clone(&self.next_minute);
        let arms = Arc::clone(&self.arms);
        let fallback = config.fallback_minutes();

        let handle = tokio::spawn(async move {
            loop {
                let now = clock.now_local_time();
                let (Some(minute), Some(delay)) =
                    (next_fallback_minute(&fallback, now), next_fallback_delay(&fallback, now))
                else {
                    return;
                };
                *next_minute.lock() = Some(minute);
                arms.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    "[Fallback] Next fallback at {} (in {}s)",
                    minutes_to_hhmm(minute),
                    delay.as_secs()
                );

                tokio::time::sleep(delay).await;

                if config_window_contains(&config, clock.now_local_minutes()) {
                    tracing::info!("[Fallback] Inside time window, reset detection covers it; skipping");
                } else {
                    tracing::info!("[Fallback] Firing fallback keep-alive");
                    // Detached: cancelling the timer must not drop requests already sent.
                    let sink = Arc::clone(&sink);
                    let config = config.clone();
                    tokio::spawn(async move { sink.fire_fallback(&config).await });
                }
            }
        });

        *self.armed.lock() = Some(ArmedTimer { handle });
    }

    /// Idempotent.
    pub fn cancel(&self) {
        if let Some(timer) = self.armed.lock().take() {
            timer.handle.abort();
            tracing::debug!("[Fallback] Timer cancelled");
        }
        *self.next_minute.lock() = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// Minute of day the armed timer targets.
    pub fn next_fire_minute(&self) -> Option<u32> {
        *self.next_minute.lock()
    }

    /// How many timers have been armed since creation.
    pub fn times_armed(&self) -> u64 {
        self.arms.load(Ordering::SeqCst)
    }
}

impl Drop for FallbackScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
