//! Token data model.

use serde::{Deserialize, Serialize};

/// OAuth token data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenData {
    /// OAuth access token
    pub access_token: String,
    /// OAuth refresh token for renewing access
    pub refresh_token: String,
    /// Token validity duration in seconds
    pub expires_in: i64,
    /// Absolute timestamp when token expires
    pub expiry_timestamp: i64,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Google Cloud project ID for API requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl TokenData {
    /// Create new token data.
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        project_id: Option<String>,
    ) -> Self {
        let expiry_timestamp = chrono::Utc::now().timestamp().saturating_add(expires_in);
        Self {
            access_token,
            refresh_token,
            expires_in,
            expiry_timestamp,
            token_type: "Bearer".to_string(),
            project_id,
        }
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expiry_timestamp
    }

    /// Check if the token will expire within the given seconds.
    pub fn expires_within(&self, seconds: i64) -> bool {
        chrono::Utc::now().timestamp().saturating_add(seconds) >= self.expiry_timestamp
    }
}

/// State reported by the token provider for an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Ok,
    Expired,
    InvalidGrant,
    RefreshFailed,
}

/// Access-token status for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenStatus {
    pub state: TokenState,
    /// Present only when `state` is `Ok`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl TokenStatus {
    pub fn ok(token: String, project_id: Option<String>) -> Self {
        Self { state: TokenState::Ok, token: Some(token), project_id }
    }

    pub const fn failed(state: TokenState) -> Self {
        Self { state, token: None, project_id: None }
    }

    /// The usable access token, if any.
    pub fn usable_token(&self) -> Option<&str> {
        match self.state {
            TokenState::Ok => self.token.as_deref(),
            _ => None,
        }
    }
}
