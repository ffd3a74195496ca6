//! Calendar scheduler: daily, weekly, interval and crontab schedules.
//!
//! Every calendar mode is compiled to a cron expression first, so there is a
//! single timer path.

mod crontab;

pub use crontab::CronSchedule;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use cockpit_types::models::parse_time_of_day;
use cockpit_types::{RepeatMode, ScheduleConfig, ScheduleError, TriggerSource};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::collaborators::{CalendarScheduler, CrontabValidation, FireCallback};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const DEFAULT_INTERVAL_START: &str = "00:00";
const DEFAULT_INTERVAL_END: &str = "23:59";

fn validation(field: &str, message: &str) -> ScheduleError {
    ScheduleError::ValidationError { field: field.to_string(), message: message.to_string() }
}

fn time_parts(field: &str, value: &str) -> Result<(u32, u32), ScheduleError> {
    let minutes = parse_time_of_day(value).ok_or_else(|| ScheduleError::InvalidTime {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    Ok((minutes / 60, minutes % 60))
}

/// Compile a calendar config to cron. Multiple times become `;`-joined expressions.
pub fn config_to_crontab(config: &ScheduleConfig) -> Result<String, ScheduleError> {
    match config.repeat_mode {
        RepeatMode::Daily => {
            if config.daily_times.is_empty() {
                return Err(validation("daily_times", "at least one time is required"));
            }
            let exprs = config
                .daily_times
                .iter()
                .map(|t| time_parts("daily_times", t).map(|(h, m)| format!("{} {} * * *", m, h)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(exprs.join(";"))
        },
        RepeatMode::Weekly => {
            if config.weekly_days.is_empty() {
                return Err(validation("weekly_days", "at least one day is required"));
            }
            if config.weekly_times.is_empty() {
                return Err(validation("weekly_times", "at least one time is required"));
            }
            let mut days = config.weekly_days.clone();
            days.sort_unstable();
            days.dedup();
            let days = days.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
            let exprs = config
                .weekly_times
                .iter()
                .map(|t| {
                    time_parts("weekly_times", t).map(|(h, m)| format!("{} {} * * {}", m, h, days))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(exprs.join(";"))
        },
        RepeatMode::Interval => {
            let every = config
                .interval_hours
                .filter(|h| (1..=23).contains(h))
                .ok_or_else(|| validation("interval_hours", "must be between 1 and 23"))?;
            let start = config.interval_start_time.as_deref().unwrap_or(DEFAULT_INTERVAL_START);
            let end = config.interval_end_time.as_deref().unwrap_or(DEFAULT_INTERVAL_END);
            let (start_hour, _) = time_parts("interval_start_time", start)?;
            let (end_hour, _) = time_parts("interval_end_time", end)?;

            if start_hour <= end_hour {
                return Ok(format!("0 {}-{}/{} * * *", start_hour, end_hour, every));
            }
            // Window wraps past midnight: list the hours explicitly.
            let span = 24 - start_hour + end_hour;
            let hours: Vec<String> = (0..=span)
                .step_by(every as usize)
                .map(|offset| ((start_hour + offset) % 24).to_string())
                .collect();
            Ok(format!("0 {} * * *", hours.join(",")))
        },
        RepeatMode::Crontab => {
            let expr = config.crontab.as_deref().map(str::trim).unwrap_or_default();
            if expr.is_empty() {
                return Err(ScheduleError::InvalidCrontab {
                    expr: String::new(),
                    message: "expression is empty".to_string(),
                });
            }
            Ok(expr.to_string())
        },
        RepeatMode::QuotaReset => {
            Err(validation("repeat_mode", "quota reset mode has no calendar schedule"))
        },
    }
}

pub fn validate_crontab(expr: &str) -> CrontabValidation {
    match CronSchedule::parse(expr) {
        Ok(_) => CrontabValidation::ok(),
        Err(e) => CrontabValidation::invalid(e),
    }
}

pub fn describe(config: &ScheduleConfig) -> String {
    match config.repeat_mode {
        RepeatMode::Daily => format!("Daily at {}", config.daily_times.join(", ")),
        RepeatMode::Weekly => {
            let mut days = config.weekly_days.clone();
            days.sort_unstable();
            days.dedup();
            let names: Vec<&str> =
                days.iter().filter_map(|d| WEEKDAY_NAMES.get(usize::from(*d)).copied()).collect();
            format!("Weekly on {} at {}", names.join(", "), config.weekly_times.join(", "))
        },
        RepeatMode::Interval => format!(
            "Every {}h between {} and {}",
            config.interval_hours.unwrap_or(1),
            config.interval_start_time.as_deref().unwrap_or(DEFAULT_INTERVAL_START),
            config.interval_end_time.as_deref().unwrap_or(DEFAULT_INTERVAL_END)
        ),
        RepeatMode::Crontab => format!("Cron: {}", config.crontab.as_deref().unwrap_or_default()),
        RepeatMode::QuotaReset => "On quota reset".to_string(),
    }
}

fn fire_source(config: &ScheduleConfig) -> TriggerSource {
    if config.repeat_mode == RepeatMode::Crontab {
        TriggerSource::Crontab
    } else {
        TriggerSource::Scheduled
    }
}

/// Runs the compiled cron schedule on one tokio task, in local time.
#[derive(Default)]
pub struct CronCalendarScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
    next_fire: Arc<Mutex<Option<DateTime<Local>>>>,
}

impl CronCalendarScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        *self.next_fire.lock()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl CalendarScheduler for CronCalendarScheduler {
    fn set_schedule(
        &self,
        config: &ScheduleConfig,
        on_fire: FireCallback,
    ) -> Result<(), ScheduleError> {
        let expr = config_to_crontab(config)?;
        let schedule = CronSchedule::parse(&expr)
            .map_err(|message| ScheduleError::InvalidCrontab { expr: expr.clone(), message })?;
        self.stop();

        let source = fire_source(config);
        let next_fire = Arc::clone(&self.next_fire);
        tracing::info!("[Scheduler] Calendar schedule set: {} ({})", describe(config), expr);

        let handle = tokio::spawn(async move {
            let mut last: Option<DateTime<Local>> = None;
            loop {
                let now = Local::now();
                let from = last.map_or(now, |l| l.max(now));
                let Some(next) = schedule.next_after(&from) else {
                    tracing::warn!("[Scheduler] No upcoming match for '{}'", expr);
                    *next_fire.lock() = None;
                    return;
                };
                *next_fire.lock() = Some(next);
                tracing::debug!("[Scheduler] Next calendar fire at {}", next.to_rfc3339());

                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                tracing::info!("[Scheduler] Calendar fire ({})", source);
                // Detached so `stop` only cancels future fires.
                tokio::spawn(on_fire(source));
                last = Some(next);
            }
        });
        *self.task.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!("[Scheduler] Calendar schedule stopped");
        }
        *self.next_fire.lock() = None;
    }

    fn describe(&self, config: &ScheduleConfig) -> String {
        describe(config)
    }

    fn config_to_crontab(&self, config: &ScheduleConfig) -> Result<String, ScheduleError> {
        config_to_crontab(config)
    }

    fn validate_crontab(&self, expr: &str) -> CrontabValidation {
        validate_crontab(expr)
    }
}

impl Drop for CronCalendarScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
