//! Config entry types
//!
//! A ConfigEntry holds one ANIO account: the persisted credentials, the
//! polling options, and the runtime lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::InvalidTransition;

/// Default polling interval in seconds
pub const DEFAULT_SCAN_INTERVAL: u64 = 300;
/// Smallest allowed polling interval
pub const MIN_SCAN_INTERVAL: u64 = 60;
/// Largest allowed polling interval
pub const MAX_SCAN_INTERVAL: u64 = 300;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being configured (non-recoverable)
    SetupInProgress,
    /// Successfully set up (recoverable)
    Loaded,
    /// Setup failed, user action needed (recoverable)
    SetupError,
    /// Waiting to retry setup after a transient failure (recoverable)
    SetupRetry,
    /// Currently unloading (non-recoverable)
    UnloadInProgress,
}

impl ConfigEntryState {
    /// Check if the entry can be unloaded/reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
                | ConfigEntryState::NotLoaded
        )
    }
}

/// How the entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured through the login flow
    #[default]
    User,
    /// Re-authentication of an existing account
    Reauth,
}

/// Persisted credentials for one ANIO account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryData {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_uuid: Option<String>,
}

/// User-configurable entry options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Polling interval in seconds
    pub scan_interval: u64,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

impl EntryOptions {
    /// The scan interval clamped into the allowed range
    pub fn effective_scan_interval(&self) -> u64 {
        self.scan_interval.clamp(MIN_SCAN_INTERVAL, MAX_SCAN_INTERVAL)
    }
}

/// A configuration entry for one ANIO account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain
    pub domain: String,

    /// Human-readable display name (the account email)
    pub title: String,

    /// Persisted credentials
    pub data: EntryData,

    /// User-configurable options
    #[serde(default)]
    pub options: EntryOptions,

    /// Lowercased account email, prevents duplicate entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Origin type
    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states (not persisted)
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Number of setup retry attempts (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Create a new config entry for the anio domain
    pub fn new(title: impl Into<String>, data: EntryData) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: anio_core::DOMAIN.to_string(),
            title: title.into(),
            data,
            options: EntryOptions::default(),
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            tries: 0,
            created_at: now,
            modified_at: now,
        }
    }

    /// Set unique_id
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Set options
    pub fn with_options(mut self, options: EntryOptions) -> Self {
        self.options = options;
        self
    }

    /// Set source
    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// Check if entry is loaded
    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Check if entry supports unload
    pub fn supports_unload(&self) -> bool {
        self.state.is_recoverable()
    }

    /// Attempt to transition to a new state with validation.
    ///
    /// Returns an error if the transition is invalid according to the FSM
    /// rules. On success, updates the state and reason fields.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;

        self.state = new_state;
        self.reason = reason;

        // Reset tries counter on non-retry states
        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }

        Ok(())
    }

    /// Increment the retry counter and return the new count
    pub fn increment_tries(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }
}
