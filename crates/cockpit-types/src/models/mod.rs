//! Core domain models for Antigravity Cockpit.
//!
//! This module contains all shared data structures used across the cockpit crates.

mod account;
mod quota;
mod schedule;
mod token;
mod trigger;

// Re-export all models
pub use account::{Account, AccountIndex, AccountSummary};
pub use quota::{ModelQuotaSnapshot, TrackedKey};
pub use schedule::{
    minutes_to_hhmm, parse_time_of_day, AccountSelection, RepeatMode, ScheduleConfig, ScheduleMode,
};
pub use token::{TokenData, TokenState, TokenStatus};
pub use trigger::{TokenUsage, TriggerRecord, TriggerSource, TriggerType};
