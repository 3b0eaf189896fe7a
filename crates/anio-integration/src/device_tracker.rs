//! Device tracker platform: GPS position of the watch
//!
//! The state is the name of the first geofence containing the device, or
//! `not_home`; coordinates travel in the attributes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use anio_coordinator::{is_inside_geofence, AnioDataUpdateCoordinator};
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "device_tracker";

const STATE_NOT_HOME: &str = "not_home";

pub struct DeviceTracker {
    base: AnioEntity,
}

impl DeviceTracker {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }

    /// Current latitude, if the device has a location
    pub async fn latitude(&self) -> Option<f64> {
        self.base
            .device_state()
            .await
            .and_then(|state| state.location)
            .map(|location| location.latitude)
    }

    /// Current longitude, if the device has a location
    pub async fn longitude(&self) -> Option<f64> {
        self.base
            .device_state()
            .await
            .and_then(|state| state.location)
            .map(|location| location.longitude)
    }

    /// Location accuracy in meters
    pub async fn location_accuracy(&self) -> Option<u32> {
        self.base
            .device_state()
            .await
            .and_then(|state| state.location)
            .map(|location| location.accuracy)
    }
}

#[async_trait]
impl Entity for DeviceTracker {
    fn unique_id(&self) -> String {
        format!("{}_location", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Location".to_string()
    }

    async fn state(&self) -> String {
        let Some(state) = self.base.device_state().await else {
            return STATE_UNKNOWN.to_string();
        };
        let Some(location) = &state.location else {
            return STATE_UNKNOWN.to_string();
        };

        state
            .geofences
            .iter()
            .find(|fence| is_inside_geofence(location.latitude, location.longitude, fence))
            .map(|fence| fence.name.clone())
            .unwrap_or_else(|| STATE_NOT_HOME.to_string())
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([("source_type".to_string(), json!("gps"))]);

        if let Some(location) = self
            .base
            .device_state()
            .await
            .and_then(|state| state.location)
        {
            attributes.insert("latitude".to_string(), json!(location.latitude));
            attributes.insert("longitude".to_string(), json!(location.longitude));
            attributes.insert("accuracy".to_string(), json!(location.accuracy));
            attributes.insert(
                "last_update".to_string(),
                match location.timestamp {
                    Some(timestamp) => json!(timestamp.to_rfc3339()),
                    None => Value::Null,
                },
            );
        }

        attributes
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, TEST_DEVICE_ID};

    #[tokio::test]
    async fn test_tracker_reports_position() {
        let harness = harness().await;
        let tracker = DeviceTracker::new(harness.coordinator.clone(), TEST_DEVICE_ID);

        assert_eq!(tracker.latitude().await, Some(52.52));
        assert_eq!(tracker.longitude().await, Some(13.405));
        assert_eq!(tracker.location_accuracy().await, Some(0));

        let attributes = tracker.attributes().await;
        assert_eq!(attributes["source_type"], "gps");
        assert_eq!(attributes["latitude"], 52.52);
    }

    #[tokio::test]
    async fn test_tracker_state_is_containing_fence() {
        let harness = harness().await;
        let tracker = DeviceTracker::new(harness.coordinator.clone(), TEST_DEVICE_ID);
        // The mock device sits on the "Home" fence center
        assert_eq!(tracker.state().await, "Home");
    }

    #[tokio::test]
    async fn test_tracker_without_device_is_unknown() {
        let harness = harness().await;
        let tracker = DeviceTracker::new(harness.coordinator.clone(), "ghost");
        assert_eq!(tracker.state().await, "unknown");
        assert!(tracker.latitude().await.is_none());
    }
}
