//! Keep-alive dispatch errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for a single keep-alive request. Always per-model, never fatal for a batch.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum DispatchError {
    /// Connection failure, DNS, TLS, etc
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Request exceeded the per-request timeout
    #[error("Request for {model} timed out after {duration_secs}s")]
    Timeout { model: String, duration_secs: u64 },

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Upstream answered 2xx but the body was unusable
    #[error("Invalid upstream response: {message}")]
    InvalidResponse { message: String },
}

impl DispatchError {
    /// Check if this error came from the network rather than the upstream service.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
