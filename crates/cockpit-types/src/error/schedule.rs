//! Schedule configuration errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating or applying a schedule configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ScheduleError {
    /// Explicit account selection is empty while the schedule is enabled
    #[error("No accounts selected")]
    NoAccountsSelected,

    /// No models selected while the schedule is enabled
    #[error("No models selected")]
    NoModelsSelected,

    /// Crontab expression failed validation
    #[error("Invalid crontab '{expr}': {message}")]
    InvalidCrontab {
        /// The rejected expression
        expr: String,
        /// Why it was rejected
        message: String,
    },

    /// A time-of-day string is not `HH:MM`
    #[error("Invalid time for {field}: '{value}'")]
    InvalidTime {
        /// Name of the config field
        field: String,
        /// The rejected value
        value: String,
    },

    /// Generic field validation failure
    #[error("Validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Persisting the schedule failed
    #[error("Schedule write error: {message}")]
    WriteError {
        /// Description of the write failure
        message: String,
    },
}

impl ScheduleError {
    /// Create a write error from an IO error.
    pub fn from_io_error(e: &std::io::Error) -> Self {
        Self::WriteError { message: e.to_string() }
    }
}
