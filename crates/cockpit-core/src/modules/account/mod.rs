//! File-backed credential store.
//!
//! Layout under the data directory:
//! - `accounts.json`: index with the active account and display order
//! - `accounts/<id>.json`: one file per account (tokens included)

mod index;
mod storage;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cockpit_types::AccountError;

use crate::error::{AppError, AppResult};
use crate::models::Account;
use crate::trigger::{AccountDirectory, AccountStore};

pub use index::{load_account_index, save_account_index, ACCOUNTS_INDEX};
pub use storage::{delete_account, find_account, list_accounts, upsert_account, ACCOUNTS_DIR};

fn storage_error(message: String) -> AppError {
    AccountError::StorageError { message }.into()
}

/// Run a blocking storage call on the blocking pool.
async fn blocking<T, F>(root: &Path, op: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, String> + Send + 'static,
{
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || op(&root)).await?.map_err(storage_error)
}

/// Accounts persisted as JSON files.
#[derive(Debug, Clone)]
pub struct JsonAccountStore {
    root: PathBuf,
}

impl JsonAccountStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full account records, in index order.
    pub async fn load_all(&self) -> AppResult<Vec<Account>> {
        blocking(&self.root, list_accounts).await
    }
}

#[async_trait]
impl AccountDirectory for JsonAccountStore {
    async fn list_accounts(&self) -> AppResult<Vec<String>> {
        let accounts = self.load_all().await?;
        Ok(accounts.into_iter().map(|a| a.email).collect())
    }

    async fn get_active(&self) -> AppResult<Option<String>> {
        let index = blocking(&self.root, load_account_index).await?;
        Ok(index.active_email)
    }

    async fn get_credential(&self, email: &str) -> AppResult<Option<Account>> {
        let email = email.to_string();
        blocking(&self.root, move |root| find_account(root, &email)).await
    }
}

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn set_active(&self, email: Option<&str>) -> AppResult<()> {
        let email = email.map(str::to_string);
        blocking(&self.root, move |root| {
            let mut index = load_account_index(root)?;
            if let Some(email) = &email {
                if !index.contains(email) {
                    return Err(format!("Account not found: {}", email));
                }
            }
            index.active_email = email;
            save_account_index(root, &index)
        })
        .await
    }

    async fn upsert(&self, account: Account) -> AppResult<()> {
        blocking(&self.root, move |root| upsert_account(root, account)).await
    }

    async fn remove(&self, email: &str) -> AppResult<bool> {
        let email = email.to_string();
        blocking(&self.root, move |root| delete_account(root, &email)).await
    }
}
