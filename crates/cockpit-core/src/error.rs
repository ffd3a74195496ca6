//! Unified error types for Cockpit Core.

use cockpit_types::{AccountError, DispatchError, ScheduleError, TypedError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for all Cockpit operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Network request failed (HTTP client).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Domain error carrying a typed payload.
    #[error(transparent)]
    Typed(#[from] TypedError),

    /// Background task failed to join.
    #[error("Task error: {0}")]
    Task(String),

    /// Unclassified error with message.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Rejected input: bad schedule, empty selection, invalid crontab.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Typed(e) if e.is_configuration())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Typed(TypedError::Account(AccountError::NotFound { .. })))
    }

    /// Token problems end an account's pass but never the process.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Typed(TypedError::Account(e)) if e.is_authorization())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for Cockpit operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        Self::Typed(TypedError::Account(e))
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        Self::Typed(TypedError::Schedule(e))
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        Self::Typed(TypedError::Dispatch(e))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Unknown(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let e: AppError = ScheduleError::NoModelsSelected.into();
        assert!(e.is_configuration());
        assert!(!e.is_not_found());

        let e: AppError = AccountError::NotFound { email: "a@x".to_string() }.into();
        assert!(e.is_not_found());
        assert!(!e.is_configuration());

        let e: AppError = AccountError::TokenExpired { email: "a@x".to_string() }.into();
        assert!(e.is_authorization());
    }

    #[test]
    fn test_serializes_as_string() {
        let e = AppError::Unknown("boom".to_string());
        assert_eq!(serde_json::to_value(&e).unwrap(), serde_json::json!("Unknown error: boom"));
    }
}
