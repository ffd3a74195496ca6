//! Typed error definitions for Antigravity Cockpit.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros

mod account;
mod dispatch;
mod schedule;

pub use account::AccountError;
pub use dispatch::DispatchError;
pub use schedule::ScheduleError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps an account-related error
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Wraps a schedule configuration error
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Wraps a keep-alive dispatch error
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl TypedError {
    /// Configuration errors are surfaced to the caller as a rejected operation.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Schedule(e) if !matches!(e, ScheduleError::WriteError { .. }))
    }
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TypedError::Account(AccountError::NotFound { email: "a@example.com".to_string() });

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Account"));
        assert!(json.contains("a@example.com"));

        let deserialized: TypedError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = DispatchError::Timeout { model: "gemini-3-flash".to_string(), duration_secs: 30 };

        let msg = format!("{}", err);
        assert!(msg.contains("gemini-3-flash"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(TypedError::from(ScheduleError::NoModelsSelected).is_configuration());
        assert!(!TypedError::from(AccountError::NoAccounts).is_configuration());
        let write = ScheduleError::WriteError { message: "disk full".to_string() };
        assert!(!TypedError::from(write).is_configuration());
    }
}
