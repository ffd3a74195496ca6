//! Token status from stored credentials.
//!
//! Refreshing tokens is the job of whoever imports accounts; this provider only
//! reports whether the stored access token is still usable.

use std::sync::Arc;

use async_trait::async_trait;
use cockpit_types::{AccountError, TokenState, TokenStatus};

use crate::error::AppResult;
use crate::trigger::{AccountDirectory, TokenProvider};

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

pub struct StoredTokenProvider {
    accounts: Arc<dyn AccountDirectory>,
}

impl StoredTokenProvider {
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn get_access_token_status(&self, email: &str) -> AppResult<TokenStatus> {
        let account = self
            .accounts
            .get_credential(email)
            .await?
            .ok_or_else(|| AccountError::NotFound { email: email.to_string() })?;

        let token = account.token;
        if token.access_token.is_empty() || token.expires_within(EXPIRY_SKEW_SECS) {
            tracing::debug!(email = %email, "stored access token is expired");
            return Ok(TokenStatus::failed(TokenState::Expired));
        }
        Ok(TokenStatus::ok(token.access_token, token.project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, TokenData};
    use crate::test_support::MemoryAccountStore;

    #[tokio::test]
    async fn test_reports_ok_and_expired() {
        let store = Arc::new(MemoryAccountStore::default());
        store.insert(Account::new(
            "live@x.com".to_string(),
            TokenData::new("tok".to_string(), "r".to_string(), 3600, Some("proj".to_string())),
        ));
        store.insert(Account::new(
            "stale@x.com".to_string(),
            TokenData::new("tok".to_string(), "r".to_string(), 10, None),
        ));
        let provider = StoredTokenProvider::new(store);

        let live = provider.get_access_token_status("live@x.com").await.unwrap();
        assert_eq!(live.usable_token(), Some("tok"));
        assert_eq!(live.project_id.as_deref(), Some("proj"));

        let stale = provider.get_access_token_status("stale@x.com").await.unwrap();
        assert_eq!(stale.state, TokenState::Expired);

        let missing = provider.get_access_token_status("ghost@x.com").await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
