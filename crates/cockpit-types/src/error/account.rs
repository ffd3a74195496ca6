//! Account-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AccountError {
    /// Account with given email not found
    #[error("Account not found: {email}")]
    NotFound {
        /// Email of the missing account
        email: String,
    },

    /// No accounts are stored at all
    #[error("No accounts available")]
    NoAccounts,

    /// Account exists but has no usable access token
    #[error("No access token available for {email}")]
    TokenUnavailable {
        /// Email of the account
        email: String,
    },

    /// Account token has expired and needs refresh
    #[error("Token expired for account: {email}")]
    TokenExpired {
        /// Email of the account with expired token
        email: String,
    },

    /// Refresh token was rejected upstream
    #[error("Authorization revoked for {email} (invalid_grant)")]
    InvalidGrant {
        /// Email of the account
        email: String,
    },

    /// Account token refresh failed
    #[error("Failed to refresh token for {email}: {message}")]
    TokenRefreshFailed {
        /// Email of the account
        email: String,
        /// Details about the refresh failure
        message: String,
    },

    /// Account storage/filesystem error
    #[error("Account storage error: {message}")]
    StorageError {
        /// Description of the storage failure
        message: String,
    },

    /// Account already present on import
    #[error("Account already exists: {email}")]
    AlreadyExists {
        /// Email of the duplicate account
        email: String,
    },
}

impl AccountError {
    /// Authorization failures abort the pass for that account only.
    pub const fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::TokenUnavailable { .. }
                | Self::TokenExpired { .. }
                | Self::InvalidGrant { .. }
                | Self::TokenRefreshFailed { .. }
        )
    }

    /// Check if this is a temporary error that may resolve on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TokenExpired { .. } | Self::TokenRefreshFailed { .. })
    }
}
