//! Account index (`accounts.json`) load/save.

use std::fs;
use std::path::Path;

use crate::models::AccountIndex;
use crate::modules::paths::write_atomic;

/// Filename for the account index.
pub const ACCOUNTS_INDEX: &str = "accounts.json";

/// Load the account index file. A missing file is an empty index.
pub fn load_account_index(root: &Path) -> Result<AccountIndex, String> {
    let index_path = root.join(ACCOUNTS_INDEX);

    if !index_path.exists() {
        return Ok(AccountIndex::new());
    }

    let content = fs::read_to_string(&index_path)
        .map_err(|e| format!("Failed to read account index: {}", e))?;

    let index: AccountIndex = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse account index: {}", e))?;

    tracing::debug!("Loaded index with {} accounts", index.accounts.len());
    Ok(index)
}

/// Save the account index file atomically.
pub fn save_account_index(root: &Path, index: &AccountIndex) -> Result<(), String> {
    let content = serde_json::to_string_pretty(index)
        .map_err(|e| format!("Failed to serialize account index: {}", e))?;

    write_atomic(&root.join(ACCOUNTS_INDEX), content.as_bytes()).map_err(|e| {
        tracing::error!("[Accounts] Failed to write account index: {}", e);
        format!("Failed to replace index file: {}", e)
    })
}
