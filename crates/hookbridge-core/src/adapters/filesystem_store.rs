//! # Filesystem Subscription Store
//!
//! Stores one JSON document per integration under a base directory:
//! `{base_path}/{integration_id}.json`. Integration ids are URL-safe, so they
//! are also safe file names.

use crate::registry::{StoreError, Subscription, SubscriptionStore};
use crate::IntegrationId;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Filesystem-based subscription store
///
/// # Examples
///
/// ```no_run
/// use hookbridge_core::adapters::FilesystemSubscriptionStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemSubscriptionStore::new(PathBuf::from("./data/subscriptions")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemSubscriptionStore {
    base_path: PathBuf,
}

impl FilesystemSubscriptionStore {
    /// Create new filesystem subscription store
    ///
    /// # Errors
    ///
    /// Returns error if base path cannot be created or accessed.
    pub async fn new(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::Io {
                message: format!("Failed to create base directory: {}", e),
            })?;

        Ok(Self { base_path })
    }

    /// Directory holding the records
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, integration: &IntegrationId) -> PathBuf {
        self.base_path.join(format!("{}.json", integration.as_str()))
    }
}

#[async_trait]
impl SubscriptionStore for FilesystemSubscriptionStore {
    async fn get(&self, integration: &IntegrationId) -> Result<Option<Subscription>, StoreError> {
        let path = self.record_path(integration);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    message: format!("Failed to read {}: {}", path.display(), e),
                })
            }
        };

        let record = serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            integration: integration.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(record))
    }

    async fn put(
        &self,
        integration: &IntegrationId,
        subscription: &Subscription,
    ) -> Result<(), StoreError> {
        let path = self.record_path(integration);

        let json = serde_json::to_string_pretty(subscription).map_err(|e| StoreError::Io {
            message: format!("Failed to serialize record: {}", e),
        })?;

        // Write to temporary file first, then rename over the record
        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = replace_with(&temp_path, &path, json.as_bytes()).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(e);
        }

        debug!(integration_id = %integration, path = %path.display(), "Stored subscription record");
        Ok(())
    }

    async fn delete(&self, integration: &IntegrationId) -> Result<(), StoreError> {
        let path = self.record_path(integration);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                message: format!("Failed to remove {}: {}", path.display(), e),
            }),
        }
    }
}

/// Write `contents` to `temp_path`, flush it and rename it over `path`.
async fn replace_with(temp_path: &Path, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| StoreError::Io {
            message: format!("Failed to create temp file: {}", e),
        })?;

    file.write_all(contents).await.map_err(|e| StoreError::Io {
        message: format!("Failed to write record: {}", e),
    })?;

    file.sync_all().await.map_err(|e| StoreError::Io {
        message: format!("Failed to flush record: {}", e),
    })?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| StoreError::Io {
            message: format!("Failed to rename temp file: {}", e),
        })
}

#[cfg(test)]
#[path = "filesystem_store_tests.rs"]
mod tests;
