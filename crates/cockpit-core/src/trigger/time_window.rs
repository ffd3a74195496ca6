//! Time-of-day window predicate.

use cockpit_types::models::parse_time_of_day;
use cockpit_types::ScheduleConfig;

/// Whether `now_minutes` (since local midnight) falls inside `[start, end)`.
///
/// A window with `start > end` wraps past midnight. A missing or unparseable
/// bound means the window is always active.
pub fn is_within_window(start: Option<&str>, end: Option<&str>, now_minutes: u32) -> bool {
    let (Some(start), Some(end)) = (start.and_then(parse_time_of_day), end.and_then(parse_time_of_day))
    else {
        return true;
    };
    if start <= end {
        start <= now_minutes && now_minutes < end
    } else {
        now_minutes >= start || now_minutes < end
    }
}

/// Window check for a schedule. No configured window means always inside.
pub fn config_window_contains(config: &ScheduleConfig, now_minutes: u32) -> bool {
    if !config.has_time_window() {
        return true;
    }
    is_within_window(
        config.time_window_start.as_deref(),
        config.time_window_end.as_deref(),
        now_minutes,
    )
}
