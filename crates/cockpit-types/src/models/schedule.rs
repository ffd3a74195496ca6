//! Auto-trigger schedule configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ScheduleError;

/// Calendar repeat mode, or reset-driven triggering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Daily,
    Weekly,
    Interval,
    Crontab,
    QuotaReset,
}

/// Which triggering path is live for a config. Exactly one at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Disabled,
    QuotaReset,
    Calendar,
}

/// Account selection for scheduled triggers.
///
/// `Unconfigured` and `Explicit(vec![])` are different: the first falls back to
/// the active (or first) account, the second selects nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Option<Vec<String>>")]
pub enum AccountSelection {
    #[default]
    Unconfigured,
    Explicit(Vec<String>),
}

impl AccountSelection {
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }

    /// Drop an email from an explicit selection. Unconfigured stays unconfigured.
    pub fn remove(&mut self, email: &str) -> bool {
        match self {
            Self::Explicit(list) => {
                let before = list.len();
                list.retain(|e| e != email);
                before != list.len()
            },
            Self::Unconfigured => false,
        }
    }
}

impl From<Option<Vec<String>>> for AccountSelection {
    fn from(value: Option<Vec<String>>) -> Self {
        value.map_or(Self::Unconfigured, Self::Explicit)
    }
}

impl From<AccountSelection> for Option<Vec<String>> {
    fn from(value: AccountSelection) -> Self {
        match value {
            AccountSelection::Unconfigured => None,
            AccountSelection::Explicit(list) => Some(list),
        }
    }
}

/// User intent for automatic keep-alive triggering (persisted as `scheduleConfig`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    /// Daily mode: "HH:MM" times
    #[serde(default)]
    pub daily_times: Vec<String>,
    /// Weekly mode: days 0-6 (Sunday = 0)
    #[serde(default)]
    pub weekly_days: Vec<u8>,
    /// Weekly mode: "HH:MM" times
    #[serde(default)]
    pub weekly_times: Vec<String>,
    /// Interval mode: hours between fires
    #[validate(range(min = 1_u32, max = 23_u32))]
    #[serde(default)]
    pub interval_hours: Option<u32>,
    #[serde(default)]
    pub interval_start_time: Option<String>,
    #[serde(default)]
    pub interval_end_time: Option<String>,
    /// Crontab mode expression
    #[serde(default)]
    pub crontab: Option<String>,
    #[serde(default)]
    pub selected_accounts: AccountSelection,
    #[serde(default)]
    pub selected_models: Vec<String>,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[validate(range(min = 1_u32, max = 65536_u32))]
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Run reset detection instead of the calendar
    #[serde(default)]
    pub wake_on_reset: bool,
    #[serde(default)]
    pub time_window_enabled: bool,
    #[serde(default)]
    pub time_window_start: Option<String>,
    #[serde(default)]
    pub time_window_end: Option<String>,
    /// "HH:MM" fallback fire times used outside the time window
    #[serde(default)]
    pub fallback_times: Vec<String>,
}

impl ScheduleConfig {
    pub fn mode(&self) -> ScheduleMode {
        if !self.enabled {
            ScheduleMode::Disabled
        } else if self.wake_on_reset {
            ScheduleMode::QuotaReset
        } else if self.repeat_mode == RepeatMode::QuotaReset {
            // Reset repeat mode without reset detection has nothing to run.
            ScheduleMode::Disabled
        } else {
            ScheduleMode::Calendar
        }
    }

    pub fn has_time_window(&self) -> bool {
        self.time_window_enabled
    }

    /// Sorted, deduplicated fallback times in minutes since midnight. Invalid entries are dropped.
    pub fn fallback_minutes(&self) -> Vec<u32> {
        let mut minutes: Vec<u32> =
            self.fallback_times.iter().filter_map(|t| parse_time_of_day(t)).collect();
        minutes.sort_unstable();
        minutes.dedup();
        minutes
    }

    /// Fallback timers run only for reset detection with a window and at least one time.
    pub fn fallback_active(&self) -> bool {
        self.mode() == ScheduleMode::QuotaReset
            && self.has_time_window()
            && !self.fallback_minutes().is_empty()
    }

    /// Check everything that does not need a crontab parser.
    pub fn check(&self) -> Result<(), ScheduleError> {
        self.validate().map_err(|e| {
            let field = e.field_errors().keys().next().map(|k| k.to_string()).unwrap_or_default();
            ScheduleError::ValidationError { field, message: e.to_string() }
        })?;

        let times = [
            ("daily_times", &self.daily_times),
            ("weekly_times", &self.weekly_times),
            ("fallback_times", &self.fallback_times),
        ];
        for (field, values) in times {
            for value in values {
                if parse_time_of_day(value).is_none() {
                    return Err(ScheduleError::InvalidTime {
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }
        let optional_times = [
            ("interval_start_time", &self.interval_start_time),
            ("interval_end_time", &self.interval_end_time),
            ("time_window_start", &self.time_window_start),
            ("time_window_end", &self.time_window_end),
        ];
        for (field, value) in optional_times {
            if let Some(value) = value {
                if parse_time_of_day(value).is_none() {
                    return Err(ScheduleError::InvalidTime {
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }
        if let Some(day) = self.weekly_days.iter().find(|d| **d > 6) {
            return Err(ScheduleError::ValidationError {
                field: "weekly_days".to_string(),
                message: format!("day {} out of range 0-6", day),
            });
        }

        if !self.enabled {
            return Ok(());
        }
        if self.selected_models.is_empty() {
            return Err(ScheduleError::NoModelsSelected);
        }
        if matches!(&self.selected_accounts, AccountSelection::Explicit(list) if list.is_empty()) {
            return Err(ScheduleError::NoAccountsSelected);
        }
        if self.repeat_mode == RepeatMode::QuotaReset && !self.wake_on_reset {
            return Err(ScheduleError::ValidationError {
                field: "wake_on_reset".to_string(),
                message: "quota reset mode requires wake on reset".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_time_of_day(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    (hours < 24 && minutes < 60 && m.len() == 2).then(|| hours * 60 + minutes)
}

/// Format minutes since midnight as "HH:MM".
pub fn minutes_to_hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn enabled_config() -> ScheduleConfig {
        ScheduleConfig {
            enabled: true,
            selected_models: vec!["gemini-3-flash".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("00:00"), Some(0));
        assert_eq!(parse_time_of_day("07:30"), Some(450));
        assert_eq!(parse_time_of_day("23:59"), Some(1439));
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("12:5"), None);
        assert_eq!(parse_time_of_day("noon"), None);
        assert_eq!(minutes_to_hhmm(450), "07:30");
    }

    #[test]
    fn test_account_selection_tri_state_serde() {
        let unconfigured: ScheduleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(unconfigured.selected_accounts, AccountSelection::Unconfigured);

        let empty: ScheduleConfig =
            serde_json::from_str(r#"{"selected_accounts": []}"#).unwrap();
        assert_eq!(empty.selected_accounts, AccountSelection::Explicit(vec![]));

        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["selected_accounts"], serde_json::json!([]));
        let json = serde_json::to_value(&unconfigured).unwrap();
        assert!(json["selected_accounts"].is_null());
    }

    #[test]
    fn test_mode_is_exclusive() {
        let mut config = enabled_config();
        assert_eq!(config.mode(), ScheduleMode::Calendar);
        config.wake_on_reset = true;
        assert_eq!(config.mode(), ScheduleMode::QuotaReset);
        config.enabled = false;
        assert_eq!(config.mode(), ScheduleMode::Disabled);
    }

    #[test]
    fn test_reset_mode_needs_wake_on_reset() {
        let mut config = enabled_config();
        config.repeat_mode = RepeatMode::QuotaReset;
        assert_eq!(config.mode(), ScheduleMode::Disabled);
        assert!(!config.fallback_active());
        assert!(matches!(
            config.check(),
            Err(ScheduleError::ValidationError { ref field, .. }) if field == "wake_on_reset"
        ));

        config.wake_on_reset = true;
        assert_eq!(config.mode(), ScheduleMode::QuotaReset);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_check_rejects_empty_selections() {
        let mut config = enabled_config();
        assert!(config.check().is_ok());

        config.selected_accounts = AccountSelection::Explicit(vec![]);
        assert_eq!(config.check(), Err(ScheduleError::NoAccountsSelected));

        config.selected_accounts = AccountSelection::Unconfigured;
        config.selected_models.clear();
        assert_eq!(config.check(), Err(ScheduleError::NoModelsSelected));

        config.enabled = false;
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_times_and_ranges() {
        let mut config = enabled_config();
        config.fallback_times = vec!["25:00".to_string()];
        assert!(matches!(config.check(), Err(ScheduleError::InvalidTime { .. })));

        let mut config = enabled_config();
        config.max_output_tokens = Some(0);
        assert!(matches!(config.check(), Err(ScheduleError::ValidationError { .. })));
    }

    #[test]
    fn test_fallback_minutes_sorted_and_active() {
        let mut config = enabled_config();
        config.wake_on_reset = true;
        config.fallback_times = vec!["18:00".to_string(), "06:30".to_string(), "18:00".to_string()];
        assert_eq!(config.fallback_minutes(), vec![390, 1080]);
        assert!(!config.fallback_active());

        config.time_window_enabled = true;
        assert!(config.fallback_active());
    }

    #[test]
    fn test_selection_remove() {
        let mut selection = AccountSelection::Explicit(vec!["a@x".to_string(), "b@x".to_string()]);
        assert!(selection.remove("a@x"));
        assert!(!selection.remove("a@x"));
        assert_eq!(selection, AccountSelection::Explicit(vec!["b@x".to_string()]));

        let mut unconfigured = AccountSelection::Unconfigured;
        assert!(!unconfigured.remove("a@x"));
    }
}
