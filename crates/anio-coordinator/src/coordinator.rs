//! Polling coordinator
//!
//! One poll cycle calls the device list, geofence list and activity feed,
//! then per device the last location, chat history, alarms, silence times
//! and tracking mode, and folds everything into a per-device state map that
//! is replaced wholesale. Calls are sequential; there is no fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use anio_api::{AnioApiClient, AnioApiError, AnioDeviceState, Geofence, LocationInfo};
use anio_core::Context;
use anio_event_bus::SharedEventBus;

use crate::geofence::is_inside_geofence;
use crate::messages::MessageTracker;

/// Consider a device offline when it hasn't answered for this long
const ONLINE_THRESHOLD_SECS: i64 = 600;

/// Why a poll cycle failed
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The stored credentials no longer work; re-authentication is needed
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A transient failure; the next poll will try again
    #[error("update failed: {0}")]
    UpdateFailed(String),
}

impl From<AnioApiError> for UpdateError {
    fn from(err: AnioApiError) -> Self {
        match err {
            AnioApiError::Auth(_) | AnioApiError::OtpRequired => {
                UpdateError::AuthFailed(err.to_string())
            }
            AnioApiError::RateLimit { .. } => {
                UpdateError::UpdateFailed(format!("rate limited: {err}"))
            }
            AnioApiError::Connection(_) => {
                UpdateError::UpdateFailed(format!("connection error: {err}"))
            }
            other => UpdateError::UpdateFailed(other.to_string()),
        }
    }
}

/// Coordinator for fetching ANIO device data on a schedule
pub struct AnioDataUpdateCoordinator {
    client: Arc<AnioApiClient>,
    bus: SharedEventBus,
    scan_interval: Duration,
    data: RwLock<HashMap<String, AnioDeviceState>>,
    geofences: RwLock<Vec<Geofence>>,
    last_activity_check: RwLock<Option<DateTime<Utc>>>,
    last_update_success: AtomicBool,
    tracker: Mutex<MessageTracker>,
    refresh_lock: Mutex<()>,
    refresh_notify: Notify,
    updated: watch::Sender<u64>,
}

impl AnioDataUpdateCoordinator {
    /// Create a coordinator polling at the given interval
    pub fn new(client: Arc<AnioApiClient>, bus: SharedEventBus, scan_interval: Duration) -> Self {
        let (updated, _) = watch::channel(0);
        Self {
            client,
            bus,
            scan_interval,
            data: RwLock::new(HashMap::new()),
            geofences: RwLock::new(Vec::new()),
            last_activity_check: RwLock::new(None),
            last_update_success: AtomicBool::new(true),
            tracker: Mutex::new(MessageTracker::new()),
            refresh_lock: Mutex::new(()),
            refresh_notify: Notify::new(),
            updated,
        }
    }

    /// The API client this coordinator polls with
    pub fn client(&self) -> &Arc<AnioApiClient> {
        &self.client
    }

    /// Snapshot of the current per-device state map
    pub async fn data(&self) -> HashMap<String, AnioDeviceState> {
        self.data.read().await.clone()
    }

    /// State for one device
    pub async fn device_state(&self, device_id: &str) -> Option<AnioDeviceState> {
        self.data.read().await.get(device_id).cloned()
    }

    /// Device ids seen in the last completed cycle
    pub async fn device_ids(&self) -> Vec<String> {
        self.data.read().await.keys().cloned().collect()
    }

    /// Cached geofences, refreshed each poll
    pub async fn geofences(&self) -> Vec<Geofence> {
        self.geofences.read().await.clone()
    }

    /// When the activity feed was last fetched
    pub async fn last_activity_check(&self) -> Option<DateTime<Utc>> {
        *self.last_activity_check.read().await
    }

    /// Whether the most recent poll cycle succeeded
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Observe completed poll cycles (the value is a cycle counter)
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updated.subscribe()
    }

    /// Ask the poll task for an immediate out-of-band refresh
    pub fn request_refresh(&self) {
        self.refresh_notify.notify_one();
    }

    /// Run one poll cycle now
    pub async fn refresh(&self) -> Result<(), UpdateError> {
        let _guard = self.refresh_lock.lock().await;

        let result = self.update_data().await;
        match result {
            Ok(states) => {
                *self.data.write().await = states;
                self.last_update_success.store(true, Ordering::SeqCst);
                self.updated.send_modify(|cycle| *cycle += 1);
                Ok(())
            }
            Err(err) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                self.updated.send_modify(|cycle| *cycle += 1);
                Err(err)
            }
        }
    }

    /// Poll loop: ticks at the scan interval, or sooner on request_refresh
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.scan_interval,
            self.scan_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.refresh_notify.notified() => {}
            }
            if let Err(err) = self.refresh().await {
                warn!(error = %err, "poll cycle failed");
            }
        }
    }

    async fn update_data(&self) -> Result<HashMap<String, AnioDeviceState>, UpdateError> {
        let devices = self.client.get_devices().await?;

        let geofences = self.client.get_geofences().await?;
        *self.geofences.write().await = geofences.clone();

        let activity = self.client.get_activity(None).await?;
        *self.last_activity_check.write().await = Some(Utc::now());

        // Fire events for new watch messages, with names from the previous cycle
        let device_names: HashMap<String, String> = self
            .data
            .read()
            .await
            .iter()
            .map(|(id, state)| (id.clone(), state.name().to_string()))
            .collect();
        self.tracker
            .lock()
            .await
            .process(&activity, &device_names, &self.bus, &Context::new());

        let mut result = HashMap::with_capacity(devices.len());

        for device in devices {
            let latest = self.client.get_last_location(&device.id).await?;

            let mut location = None;
            let mut last_seen = None;
            let mut battery_level = 0;
            let mut signal_strength = 0;

            if let Some(latest) = latest {
                location = Some(LocationInfo {
                    latitude: latest.latitude(),
                    longitude: latest.longitude(),
                    accuracy: 0,
                    timestamp: Some(latest.date),
                });
                last_seen = Some(latest.last_response);
                battery_level = latest.battery_level;
                signal_strength = latest.signal_strength;
            } else {
                // Devices that never reported through /last may still have
                // LOCATION items in the activity feed
                location = self.client.location_from_activity(&device.id).await?;
            }

            // Last message from the watch side, if any
            let chat_messages = self.client.get_chat_history(&device.id).await?;
            let last_message = chat_messages
                .iter()
                .rev()
                .find(|message| message.sender.is_from_watch())
                .cloned();

            let alarms = self.client.get_alarms(&device.id).await?;
            let silence_times = self.client.get_silence_times(&device.id).await?;
            let tracking_mode = self.client.get_tracking_mode(&device.id).await?;

            let is_online = calculate_online_status(last_seen);

            let device_id = device.id.clone();
            result.insert(
                device_id,
                AnioDeviceState {
                    device,
                    location,
                    geofences: geofences.clone(),
                    last_seen,
                    is_online,
                    battery_level,
                    signal_strength,
                    last_message,
                    alarms,
                    silence_times,
                    tracking_mode,
                },
            );
        }

        debug!(
            devices = result.len(),
            geofences = geofences.len(),
            "poll cycle complete"
        );
        Ok(result)
    }

    /// Check if a device is inside a specific geofence
    pub async fn is_device_in_geofence(&self, device_id: &str, geofence_id: &str) -> bool {
        let Some(location) = self
            .data
            .read()
            .await
            .get(device_id)
            .and_then(|state| state.location.clone())
        else {
            return false;
        };

        self.geofences
            .read()
            .await
            .iter()
            .find(|fence| fence.id == geofence_id)
            .map(|fence| is_inside_geofence(location.latitude, location.longitude, fence))
            .unwrap_or(false)
    }
}

fn calculate_online_status(last_seen: Option<DateTime<Utc>>) -> bool {
    match last_seen {
        Some(seen) => (Utc::now() - seen) < chrono::Duration::seconds(ONLINE_THRESHOLD_SECS),
        None => false,
    }
}
