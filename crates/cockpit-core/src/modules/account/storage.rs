//! Per-account file storage (`accounts/<id>.json`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Account, AccountSummary};
use crate::modules::paths::write_atomic;

use super::index::{load_account_index, save_account_index};

/// Directory name for individual account files.
pub const ACCOUNTS_DIR: &str = "accounts";

fn account_path(root: &Path, account_id: &str) -> PathBuf {
    root.join(ACCOUNTS_DIR).join(format!("{}.json", account_id))
}

/// Load a single account by ID.
pub fn load_account(root: &Path, account_id: &str) -> Result<Account, String> {
    let path = account_path(root, account_id);

    if !path.exists() {
        return Err(format!("Account not found: {}", account_id));
    }

    let content =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read account data: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse account data: {}", e))
}

/// Save a single account atomically.
pub fn save_account(root: &Path, account: &Account) -> Result<(), String> {
    let content = serde_json::to_string_pretty(account)
        .map_err(|e| format!("Failed to serialize account data: {}", e))?;

    write_atomic(&account_path(root, &account.id), content.as_bytes())
        .map_err(|e| format!("Failed to write account file: {}", e))
}

/// List indexed accounts, dropping index entries whose files are gone or corrupt.
pub fn list_accounts(root: &Path) -> Result<Vec<Account>, String> {
    let mut index = load_account_index(root)?;
    let mut accounts = Vec::new();
    let mut invalid_ids = Vec::new();

    for summary in &index.accounts {
        match load_account(root, &summary.id) {
            Ok(account) => accounts.push(account),
            Err(e) => {
                tracing::error!("[Accounts] Failed to load account {}: {}", summary.email, e);
                invalid_ids.push(summary.id.clone());
            },
        }
    }

    if !invalid_ids.is_empty() {
        tracing::warn!(
            "[Accounts] Found {} invalid account indices, cleaning up...",
            invalid_ids.len()
        );

        index.accounts.retain(|s| !invalid_ids.contains(&s.id));
        if let Some(active) = &index.active_email {
            if !index.contains(active) {
                index.active_email = index.accounts.first().map(|s| s.email.clone());
            }
        }
        save_account_index(root, &index)?;
    }

    Ok(accounts)
}

/// Insert or replace by email. The first account becomes active.
pub fn upsert_account(root: &Path, mut account: Account) -> Result<(), String> {
    let mut index = load_account_index(root)?;

    if let Some(existing) = index.accounts.iter_mut().find(|s| s.email == account.email) {
        account.id = existing.id.clone();
        account.created_at = existing.created_at;
        existing.name = account.name.clone();
    } else {
        index.accounts.push(AccountSummary::from(&account));
    }
    if index.active_email.is_none() {
        index.active_email = Some(account.email.clone());
    }

    save_account(root, &account)?;
    save_account_index(root, &index)?;
    tracing::info!(email = %account.email, "[Accounts] Account saved");
    Ok(())
}

/// Remove by email. Reassigns the active account when needed.
pub fn delete_account(root: &Path, email: &str) -> Result<bool, String> {
    let mut index = load_account_index(root)?;
    let Some(pos) = index.accounts.iter().position(|s| s.email == email) else {
        return Ok(false);
    };
    let summary = index.accounts.remove(pos);

    if index.active_email.as_deref() == Some(email) {
        index.active_email = index.accounts.first().map(|s| s.email.clone());
    }
    save_account_index(root, &index)?;

    let path = account_path(root, &summary.id);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| format!("Failed to delete account file: {}", e))?;
    }
    tracing::debug!(email = %email, "[Accounts] Account file removed");
    Ok(true)
}

/// Find an account by email.
pub fn find_account(root: &Path, email: &str) -> Result<Option<Account>, String> {
    let index = load_account_index(root)?;
    match index.accounts.iter().find(|s| s.email == email) {
        Some(summary) => load_account(root, &summary.id).map(Some),
        None => Ok(None),
    }
}
