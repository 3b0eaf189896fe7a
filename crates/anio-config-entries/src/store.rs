//! JSON persistence for config entries
//!
//! Follows the `.storage/` directory pattern: one versioned JSON file
//! wrapping the entry list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::entry::ConfigEntry;

/// Storage key (file name) for config entries
pub const STORAGE_KEY: &str = "anio.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version mismatch for {key}: expected {expected}, found {found}")]
    VersionMismatch {
        key: String,
        expected: u32,
        found: u32,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted shape of the entry list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

/// Versioned envelope written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    minor_version: u32,
    key: String,
    data: ConfigEntriesData,
}

/// Storage backend for the `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Create a storage backend under the given config directory
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    fn file_path(&self) -> PathBuf {
        self.storage_dir.join(STORAGE_KEY)
    }

    /// Load the entry list, or None when nothing was saved yet
    pub async fn load(&self) -> StorageResult<Option<ConfigEntriesData>> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).await?;
        let file: StorageFile = serde_json::from_str(&contents)?;

        if file.version > STORAGE_VERSION {
            return Err(StorageError::VersionMismatch {
                key: STORAGE_KEY.to_string(),
                expected: STORAGE_VERSION,
                found: file.version,
            });
        }

        debug!(
            entries = file.data.entries.len(),
            version = file.version,
            "loaded config entries from storage"
        );
        Ok(Some(file.data))
    }

    /// Save the entry list, creating the storage directory if needed
    pub async fn save(&self, data: &ConfigEntriesData) -> StorageResult<()> {
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await?;
        }

        let file = StorageFile {
            version: STORAGE_VERSION,
            minor_version: STORAGE_MINOR_VERSION,
            key: STORAGE_KEY.to_string(),
            data: data.clone(),
        };

        let contents = serde_json::to_string_pretty(&file)?;
        fs::write(self.file_path(), contents).await?;
        debug!(entries = data.entries.len(), "saved config entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryData;

    fn sample_entry() -> ConfigEntry {
        ConfigEntry::new(
            "test@example.com",
            EntryData {
                email: "test@example.com".to_string(),
                access_token: Some("access".to_string()),
                refresh_token: Some("refresh".to_string()),
                app_uuid: None,
            },
        )
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());

        let data = ConfigEntriesData {
            entries: vec![sample_entry()],
        };
        storage.save(&data).await.unwrap();

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].title, "test@example.com");
        assert_eq!(
            loaded.entries[0].data.refresh_token.as_deref(),
            Some("refresh")
        );
    }

    #[tokio::test]
    async fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());

        fs::create_dir_all(storage.storage_dir.clone()).await.unwrap();
        fs::write(
            storage.file_path(),
            serde_json::json!({
                "version": 99,
                "minor_version": 0,
                "key": STORAGE_KEY,
                "data": {"entries": []},
            })
            .to_string(),
        )
        .await
        .unwrap();

        let err = storage.load().await.unwrap_err();
        assert!(matches!(err, StorageError::VersionMismatch { found: 99, .. }));
    }
}
