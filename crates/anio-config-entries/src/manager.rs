//! Config entries manager
//!
//! Owns the entry collection: indexes, duplicate prevention by account,
//! state transitions, and write-through persistence. The auth handler's
//! token-persistence callback lands in `update_tokens`.

use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::state_machine::InvalidTransition;
use crate::store::{ConfigEntriesData, Storage, StorageError, StorageResult};

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry already exists for account {unique_id}")]
    AlreadyExists { unique_id: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Manages the lifecycle of configuration entries
pub struct ConfigEntries {
    storage: Storage,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_unique_id: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load().await? {
            info!(count = data.entries.len(), "loading config entries");
            for entry in data.entries {
                self.index_entry(entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };
        self.storage.save(&data).await
    }

    fn index_entry(&self, entry: ConfigEntry) {
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id.insert(
                (entry.domain.clone(), unique_id.clone()),
                entry.entry_id.clone(),
            );
        }
        self.entries.insert(entry.entry_id.clone(), entry);
    }

    /// Add a new entry, rejecting a duplicate account, and persist
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<String> {
        if let Some(ref unique_id) = entry.unique_id {
            let key = (entry.domain.clone(), unique_id.clone());
            if self.by_unique_id.contains_key(&key) {
                return Err(ConfigEntriesError::AlreadyExists {
                    unique_id: unique_id.clone(),
                });
            }
        }

        let entry_id = entry.entry_id.clone();
        self.index_entry(entry);
        self.save().await?;
        Ok(entry_id)
    }

    /// Get an entry by id
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Find an entry by its unique id (lowercased account email)
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))?;
        self.get(entry_id.value())
    }

    /// All entries
    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.iter().map(|r| r.value().clone()).collect()
    }

    /// Apply a mutation to an entry, bump its modified time, and persist
    pub async fn update_entry<F>(&self, entry_id: &str, mutate: F) -> ConfigEntriesResult<()>
    where
        F: FnOnce(&mut ConfigEntry),
    {
        {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            mutate(entry.value_mut());
            entry.modified_at = Utc::now();
        }
        self.save().await?;
        Ok(())
    }

    /// Persist rotated tokens after a refresh
    pub async fn update_tokens(
        &self,
        entry_id: &str,
        access_token: String,
        refresh_token: String,
    ) -> ConfigEntriesResult<()> {
        debug!(entry_id, "persisting refreshed tokens");
        self.update_entry(entry_id, |entry| {
            entry.data.access_token = Some(access_token);
            entry.data.refresh_token = Some(refresh_token);
        })
        .await
    }

    /// Transition an entry's lifecycle state
    ///
    /// Runtime state isn't persisted, so no save happens here.
    pub fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        Ok(())
    }

    /// Bump an entry's setup retry counter (runtime only, not persisted)
    pub fn increment_tries(&self, entry_id: &str) -> ConfigEntriesResult<u32> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        Ok(entry.increment_tries())
    }

    /// Remove an entry and persist
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.save().await?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryData;

    fn entry_for(email: &str) -> ConfigEntry {
        ConfigEntry::new(
            email,
            EntryData {
                email: email.to_string(),
                access_token: Some("access".to_string()),
                refresh_token: Some("refresh".to_string()),
                app_uuid: None,
            },
        )
        .with_unique_id(email.to_lowercase())
    }

    fn manager(dir: &tempfile::TempDir) -> ConfigEntries {
        ConfigEntries::new(Storage::new(dir.path()))
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        let entry_id = entries.add(entry_for("Test@Example.com")).await.unwrap();
        let entry = entries.get(&entry_id).unwrap();
        assert_eq!(entry.title, "Test@Example.com");

        let by_account = entries
            .get_by_unique_id("anio", "test@example.com")
            .unwrap();
        assert_eq!(by_account.entry_id, entry_id);
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        entries.add(entry_for("test@example.com")).await.unwrap();
        let err = entries.add(entry_for("test@example.com")).await.unwrap_err();
        assert!(matches!(err, ConfigEntriesError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_tokens_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        let entry_id = entries.add(entry_for("test@example.com")).await.unwrap();
        entries
            .update_tokens(&entry_id, "new-access".to_string(), "new-refresh".to_string())
            .await
            .unwrap();

        // A fresh manager over the same directory sees the rotated tokens
        let reloaded = manager(&dir);
        reloaded.load().await.unwrap();
        let entry = reloaded.get(&entry_id).unwrap();
        assert_eq!(entry.data.access_token.as_deref(), Some("new-access"));
        assert_eq!(entry.data.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[tokio::test]
    async fn test_set_state_validates_transition() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        let entry_id = entries.add(entry_for("test@example.com")).await.unwrap();

        entries
            .set_state(&entry_id, ConfigEntryState::SetupInProgress, None)
            .unwrap();
        entries
            .set_state(&entry_id, ConfigEntryState::Loaded, None)
            .unwrap();
        assert!(entries.get(&entry_id).unwrap().is_loaded());

        let err = entries
            .set_state(&entry_id, ConfigEntryState::SetupInProgress, None)
            .unwrap_err();
        assert!(matches!(err, ConfigEntriesError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_increment_tries_counts_retries() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        let entry_id = entries.add(entry_for("test@example.com")).await.unwrap();
        entries
            .set_state(&entry_id, ConfigEntryState::SetupInProgress, None)
            .unwrap();
        entries
            .set_state(&entry_id, ConfigEntryState::SetupRetry, None)
            .unwrap();

        assert_eq!(entries.increment_tries(&entry_id).unwrap(), 1);
        assert_eq!(entries.increment_tries(&entry_id).unwrap(), 2);
        assert_eq!(entries.get(&entry_id).unwrap().tries, 2);
    }

    #[tokio::test]
    async fn test_remove_clears_unique_id_index() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        let entry_id = entries.add(entry_for("test@example.com")).await.unwrap();
        entries.remove(&entry_id).await.unwrap();

        assert!(entries.get(&entry_id).is_none());
        // The account can be configured again
        assert!(entries.add(entry_for("test@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_entry_errors() {
        let dir = tempfile::tempdir().unwrap();
        let entries = manager(&dir);

        assert!(matches!(
            entries.set_state("missing", ConfigEntryState::SetupInProgress, None),
            Err(ConfigEntriesError::NotFound(_))
        ));
        assert!(matches!(
            entries.remove("missing").await,
            Err(ConfigEntriesError::NotFound(_))
        ));
    }
}
