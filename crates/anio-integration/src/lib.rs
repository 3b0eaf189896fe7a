//! The ANIO smartwatch integration
//!
//! Wires one config entry into a running integration: an auth handler whose
//! rotated tokens persist back into the entry, the API client, the polling
//! coordinator, and the entity platforms publishing state over the bus.

mod binary_sensor;
mod button;
mod config_flow;
mod device_tracker;
mod entity;
mod notify;
mod platform;
mod select;
mod sensor;
mod switch;
#[cfg(test)]
mod testing;

pub use binary_sensor::{GeofenceSensor, OnlineSensor};
pub use button::{AnioButton, ButtonKind};
pub use config_flow::{AnioConfigFlow, FlowResult, FlowStep};
pub use device_tracker::DeviceTracker;
pub use entity::{slugify, AnioEntity, DeviceInfo, Entity};
pub use notify::{MessageKind, NotifyEntity};
pub use platform::{entities_for_entry, StatePublisher};
pub use select::{RingProfileSelect, RING_PROFILES};
pub use sensor::{
    BatterySensor, LastMessageSensor, LastSeenSensor, NextAlarmSensor, SignalStrengthSensor,
    TrackingModeSensor,
};
pub use switch::SilenceTimeSwitch;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use anio_api::{AnioApiClient, AnioAuth, TokenRefreshCallback, API_URL};
use anio_config_entries::{
    calculate_retry_delay, ConfigEntries, ConfigEntriesError, ConfigEntryState,
};
use anio_coordinator::{AnioDataUpdateCoordinator, UpdateError};
use anio_event_bus::SharedEventBus;

/// Setup/unload errors
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Stored credentials no longer work; the reauth flow should run
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Transient failure; setup should be retried later
    #[error("setup will be retried: {0}")]
    Retry(String),

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),
}

struct LoadedEntry {
    coordinator: Arc<AnioDataUpdateCoordinator>,
    client: Arc<AnioApiClient>,
    poll_task: JoinHandle<()>,
    publish_task: JoinHandle<()>,
}

/// Runtime owner of all loaded config entries
pub struct AnioIntegration {
    entries: Arc<ConfigEntries>,
    bus: SharedEventBus,
    http: reqwest::Client,
    base_url: String,
    loaded: DashMap<String, LoadedEntry>,
}

impl AnioIntegration {
    pub fn new(entries: Arc<ConfigEntries>, bus: SharedEventBus) -> Self {
        Self {
            entries,
            bus,
            http: reqwest::Client::new(),
            base_url: API_URL.to_string(),
            loaded: DashMap::new(),
        }
    }

    /// Point the integration at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Start a login flow against this integration's entry store
    pub fn config_flow(&self) -> AnioConfigFlow {
        AnioConfigFlow::new(self.entries.clone(), self.http.clone())
            .with_base_url(&self.base_url)
    }

    /// The coordinator behind a loaded entry
    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<AnioDataUpdateCoordinator>> {
        self.loaded.get(entry_id).map(|l| l.coordinator.clone())
    }

    /// The API client behind a loaded entry
    pub fn client(&self, entry_id: &str) -> Option<Arc<AnioApiClient>> {
        self.loaded.get(entry_id).map(|l| l.client.clone())
    }

    /// Set up a config entry: auth, client, coordinator, platforms
    pub async fn setup_entry(&self, entry_id: &str) -> Result<(), SetupError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| SetupError::NotFound(entry_id.to_string()))?;

        self.entries
            .set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        // Rotated tokens flow back into the entry store
        let callback: TokenRefreshCallback = {
            let entries = self.entries.clone();
            let entry_id = entry_id.to_string();
            Arc::new(move |access_token, refresh_token| {
                let entries = entries.clone();
                let entry_id = entry_id.clone();
                Box::pin(async move {
                    if let Err(err) = entries
                        .update_tokens(&entry_id, access_token, refresh_token)
                        .await
                    {
                        warn!(error = %err, "failed to persist refreshed tokens");
                    }
                })
            })
        };

        let mut auth = AnioAuth::new(self.http.clone())
            .with_base_url(&self.base_url)
            .with_tokens(
                entry.data.access_token.clone(),
                entry.data.refresh_token.clone(),
            )
            .with_refresh_callback(callback);
        if let Some(app_uuid) = entry.data.app_uuid.clone() {
            auth = auth.with_app_uuid(app_uuid);
        }
        let auth = Arc::new(auth);

        let client = Arc::new(
            AnioApiClient::new(self.http.clone(), auth.clone()).with_base_url(&self.base_url),
        );

        let scan_interval = Duration::from_secs(entry.options.effective_scan_interval());
        let coordinator = Arc::new(AnioDataUpdateCoordinator::new(
            client.clone(),
            self.bus.clone(),
            scan_interval,
        ));

        // First refresh decides whether this entry loads at all
        if let Err(err) = coordinator.refresh().await {
            return match err {
                UpdateError::AuthFailed(reason) => {
                    self.entries.set_state(
                        entry_id,
                        ConfigEntryState::SetupError,
                        Some(reason.clone()),
                    )?;
                    Err(SetupError::AuthFailed(reason))
                }
                UpdateError::UpdateFailed(reason) => {
                    self.entries.set_state(
                        entry_id,
                        ConfigEntryState::SetupRetry,
                        Some(reason.clone()),
                    )?;
                    let tries = self.entries.increment_tries(entry_id)?;
                    warn!(
                        entry_id,
                        tries,
                        retry_in_secs = calculate_retry_delay(tries),
                        "first refresh failed"
                    );
                    Err(SetupError::Retry(reason))
                }
            };
        }

        let entities = entities_for_entry(coordinator.clone(), client.clone()).await;
        let device_count = coordinator.device_ids().await.len();

        let publisher = StatePublisher::new(self.bus.clone(), entities);
        let publish_task = tokio::spawn(publisher.run(coordinator.subscribe()));
        let poll_task = tokio::spawn(coordinator.clone().run());

        self.loaded.insert(
            entry_id.to_string(),
            LoadedEntry {
                coordinator,
                client,
                poll_task,
                publish_task,
            },
        );
        self.entries
            .set_state(entry_id, ConfigEntryState::Loaded, None)?;

        info!(entry_id, devices = device_count, "integration set up");
        Ok(())
    }

    /// Unload a config entry, stopping its tasks
    pub async fn unload_entry(&self, entry_id: &str) -> Result<(), SetupError> {
        let (_, loaded) = self
            .loaded
            .remove(entry_id)
            .ok_or_else(|| SetupError::NotFound(entry_id.to_string()))?;

        self.entries
            .set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        loaded.poll_task.abort();
        loaded.publish_task.abort();

        self.entries
            .set_state(entry_id, ConfigEntryState::NotLoaded, None)?;

        info!(entry_id, "integration unloaded");
        Ok(())
    }

    /// Unload every loaded entry
    pub async fn shutdown(&self) {
        let entry_ids: Vec<String> = self.loaded.iter().map(|l| l.key().clone()).collect();
        for entry_id in entry_ids {
            if let Err(err) = self.unload_entry(&entry_id).await {
                warn!(entry_id, error = %err, "failed to unload entry");
            }
        }
    }
}
