//! Config entry lifecycle and credential storage for the ANIO integration
//!
//! A ConfigEntry holds one ANIO account: persisted credentials (tokens and
//! app UUID), the polling options, and a runtime lifecycle state with
//! validated transitions. The manager indexes entries, prevents duplicate
//! accounts, and writes every change through to the `.storage/` JSON file.

mod entry;
mod manager;
mod state_machine;
mod store;

pub use entry::{
    ConfigEntry, ConfigEntrySource, ConfigEntryState, EntryData, EntryOptions,
    DEFAULT_SCAN_INTERVAL, MAX_SCAN_INTERVAL, MIN_SCAN_INTERVAL,
};
pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
pub use store::{ConfigEntriesData, Storage, StorageError, StorageResult};
