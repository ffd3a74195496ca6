//! Account model and related types.

use super::TokenData;
use serde::{Deserialize, Serialize};

/// A signed-in Google account whose model quotas are kept alive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique identifier, names the account file
    pub id: String,
    /// Email address, the account identity
    pub email: String,
    /// Optional display name
    pub name: Option<String>,
    /// Authentication token data
    pub token: TokenData,
    /// Timestamp when account was created
    pub created_at: i64,
    /// Timestamp when account was last used
    pub last_used: i64,
}

impl Account {
    /// Create a new account with the given email and token.
    pub fn new(email: String, token: TokenData) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: None,
            token,
            created_at: now,
            last_used: now,
        }
    }

    /// Update the last used timestamp to now.
    pub fn update_last_used(&mut self) {
        self.last_used = chrono::Utc::now().timestamp();
    }
}

/// Account index data structure (accounts.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountIndex {
    /// Schema version
    pub version: String,
    /// List of account summaries, in display order
    pub accounts: Vec<AccountSummary>,
    /// Currently active account email
    pub active_email: Option<String>,
}

impl AccountIndex {
    /// Create a new empty account index.
    pub fn new() -> Self {
        Self { version: "1.0".to_string(), accounts: Vec::new(), active_email: None }
    }

    /// Check whether an account with this email is indexed.
    pub fn contains(&self, email: &str) -> bool {
        self.accounts.iter().any(|s| s.email == email)
    }
}

impl Default for AccountIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Account summary for the index file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSummary {
    /// Unique identifier
    pub id: String,
    /// Email address
    pub email: String,
    /// Optional display name
    pub name: Option<String>,
    /// Creation timestamp
    pub created_at: i64,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            created_at: account.created_at,
        }
    }
}
