//! On-disk model catalog cache.
//!
//! Stores which models exist (ids, constants, display names), never quota
//! levels. A version mismatch or unreadable file counts as a miss.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::{write_atomic, CATALOG_CACHE_FILE};
use crate::error::AppResult;
use crate::models::ModelQuotaSnapshot;
use crate::trigger::Clock;

pub const CATALOG_CACHE_VERSION: u32 = 1;
pub const CATALOG_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CatalogCacheFile {
    version: u32,
    /// Epoch milliseconds
    updated_at: i64,
    models: Vec<ModelQuotaSnapshot>,
}

pub struct ModelCatalogCache {
    path: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ModelCatalogCache {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        Self { path: data_dir.join(CATALOG_CACHE_FILE), ttl: CATALOG_CACHE_TTL, clock }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached catalog if present, current-version and younger than the TTL.
    pub async fn load_fresh(&self) -> Option<Vec<ModelQuotaSnapshot>> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        let file: CatalogCacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("[Catalog] Unreadable cache, ignoring: {}", e);
                return None;
            },
        };
        if file.version != CATALOG_CACHE_VERSION {
            tracing::debug!("[Catalog] Cache version {} is stale", file.version);
            return None;
        }
        let age_ms = self.clock.now_ms().saturating_sub(file.updated_at);
        if age_ms < 0 || age_ms as u128 >= self.ttl.as_millis() {
            return None;
        }
        Some(file.models)
    }

    pub async fn store(&self, models: &[ModelQuotaSnapshot]) -> AppResult<()> {
        let file = CatalogCacheFile {
            version: CATALOG_CACHE_VERSION,
            updated_at: self.clock.now_ms(),
            models: models
                .iter()
                .map(|m| ModelQuotaSnapshot { remaining_fraction: None, reset_time: None, ..m.clone() })
                .collect(),
        };
        let content = serde_json::to_vec_pretty(&file)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &content)).await??;
        Ok(())
    }

    pub async fn invalidate(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("[Catalog] Failed to remove cache: {}", e);
            }
        }
    }

    /// Serve from cache, or fetch and refill it. A failed write only logs.
    pub async fn get_or_fetch<F>(&self, fetch: F) -> AppResult<Vec<ModelQuotaSnapshot>>
    where
        F: Future<Output = AppResult<Vec<ModelQuotaSnapshot>>>,
    {
        if let Some(models) = self.load_fresh().await {
            return Ok(models);
        }
        let models = fetch.await?;
        if let Err(e) = self.store(&models).await {
            tracing::warn!("[Catalog] Failed to write cache: {}", e);
        }
        Ok(models)
    }
}
