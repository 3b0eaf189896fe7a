//! Sensor platform: battery, last seen, signal strength, last message,
//! next alarm, tracking mode

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::{MAX_STATE_LENGTH, STATE_UNKNOWN};

use crate::entity::{state_or_unknown, AnioEntity, Entity};

const PLATFORM: &str = "sensor";

/// All sensors for one device
pub fn sensors_for(
    coordinator: Arc<AnioDataUpdateCoordinator>,
    device_id: &str,
) -> Vec<Box<dyn Entity>> {
    vec![
        Box::new(BatterySensor::new(coordinator.clone(), device_id)),
        Box::new(LastSeenSensor::new(coordinator.clone(), device_id)),
        Box::new(SignalStrengthSensor::new(coordinator.clone(), device_id)),
        Box::new(LastMessageSensor::new(coordinator.clone(), device_id)),
        Box::new(NextAlarmSensor::new(coordinator.clone(), device_id)),
        Box::new(TrackingModeSensor::new(coordinator, device_id)),
    ]
}

/// Battery level of the watch
pub struct BatterySensor {
    base: AnioEntity,
}

impl BatterySensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for BatterySensor {
    fn unique_id(&self) -> String {
        format!("{}_battery", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Battery".to_string()
    }

    async fn state(&self) -> String {
        state_or_unknown(
            self.base
                .device_state()
                .await
                .map(|state| state.battery_level),
        )
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("device_class".to_string(), json!("battery")),
            ("unit_of_measurement".to_string(), json!("%")),
            ("state_class".to_string(), json!("measurement")),
            ("entity_category".to_string(), json!("diagnostic")),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

/// When the watch last answered the cloud
pub struct LastSeenSensor {
    base: AnioEntity,
}

impl LastSeenSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for LastSeenSensor {
    fn unique_id(&self) -> String {
        format!("{}_last_seen", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Last Seen".to_string()
    }

    async fn state(&self) -> String {
        state_or_unknown(
            self.base
                .device_state()
                .await
                .and_then(|state| state.last_seen)
                .map(|seen| seen.to_rfc3339()),
        )
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("device_class".to_string(), json!("timestamp")),
            ("entity_category".to_string(), json!("diagnostic")),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

/// Cellular signal strength reported with the last location fix
pub struct SignalStrengthSensor {
    base: AnioEntity,
}

impl SignalStrengthSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for SignalStrengthSensor {
    fn unique_id(&self) -> String {
        format!("{}_signal_strength", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Signal Strength".to_string()
    }

    async fn state(&self) -> String {
        state_or_unknown(
            self.base
                .device_state()
                .await
                .map(|state| state.signal_strength),
        )
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("icon".to_string(), json!("mdi:signal")),
            ("unit_of_measurement".to_string(), json!("%")),
            ("state_class".to_string(), json!("measurement")),
            ("entity_category".to_string(), json!("diagnostic")),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

/// Text of the last message the watch sent
pub struct LastMessageSensor {
    base: AnioEntity,
}

impl LastMessageSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for LastMessageSensor {
    fn unique_id(&self) -> String {
        format!("{}_last_message", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Last Message".to_string()
    }

    async fn state(&self) -> String {
        match self
            .base
            .device_state()
            .await
            .and_then(|state| state.last_message)
        {
            // State values are capped; long messages stay in full in the attributes
            Some(message) => message.text.chars().take(MAX_STATE_LENGTH).collect(),
            None => STATE_UNKNOWN.to_string(),
        }
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([("icon".to_string(), json!("mdi:message-text"))]);

        if let Some(message) = self
            .base
            .device_state()
            .await
            .and_then(|state| state.last_message)
        {
            attributes.insert("text".to_string(), json!(message.text));
            attributes.insert("sender".to_string(), json!(message.sender));
            attributes.insert("type".to_string(), json!(message.message_type));
            attributes.insert(
                "created_at".to_string(),
                json!(message.created_at.to_rfc3339()),
            );
            attributes.insert("is_read".to_string(), json!(message.is_read));
        }

        attributes
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

/// Earliest enabled alarm on the watch
pub struct NextAlarmSensor {
    base: AnioEntity,
}

impl NextAlarmSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }

    async fn next_alarm(&self) -> Option<anio_api::AlarmClock> {
        let state = self.base.device_state().await?;
        state
            .alarms
            .iter()
            .filter(|alarm| alarm.enabled)
            .min_by(|a, b| a.time.cmp(&b.time))
            .cloned()
    }
}

#[async_trait]
impl Entity for NextAlarmSensor {
    fn unique_id(&self) -> String {
        format!("{}_next_alarm", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Next Alarm".to_string()
    }

    async fn state(&self) -> String {
        state_or_unknown(self.next_alarm().await.map(|alarm| alarm.time))
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([("icon".to_string(), json!("mdi:alarm"))]);

        if let Some(state) = self.base.device_state().await {
            let enabled_count = state.alarms.iter().filter(|a| a.enabled).count();
            attributes.insert("alarm_count".to_string(), json!(state.alarms.len()));
            attributes.insert("enabled_count".to_string(), json!(enabled_count));
            attributes.insert(
                "next_alarm_days".to_string(),
                match self.next_alarm().await {
                    Some(alarm) => json!(alarm.days.join(", ")),
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

/// How often the watch reports its position
pub struct TrackingModeSensor {
    base: AnioEntity,
}

impl TrackingModeSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for TrackingModeSensor {
    fn unique_id(&self) -> String {
        format!("{}_tracking_mode", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Tracking Mode".to_string()
    }

    async fn state(&self) -> String {
        state_or_unknown(
            self.base
                .device_state()
                .await
                .and_then(|state| state.tracking_mode),
        )
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("icon".to_string(), json!("mdi:crosshairs-gps")),
            ("entity_category".to_string(), json!("diagnostic")),
        ])
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
    async fn test_sensor_suite_for_device() {
        let harness = harness().await;
        let sensors = sensors_for(harness.coordinator.clone(), TEST_DEVICE_ID);
        assert_eq!(sensors.len(), 6);
        for sensor in &sensors {
            assert!(sensor.available().await);
            assert_eq!(sensor.platform(), "sensor");
        }
    }

    #[tokio::test]
    async fn test_battery_sensor() {
        let harness = harness().await;
        let sensor = BatterySensor::new(harness.coordinator.clone(), TEST_DEVICE_ID);

        assert_eq!(sensor.unique_id(), format!("{TEST_DEVICE_ID}_battery"));
        assert_eq!(
            sensor.entity_id().to_string(),
            format!("sensor.{TEST_DEVICE_ID}_battery")
        );
        assert_eq!(sensor.state().await, "85");
        assert_eq!(sensor.attributes().await["device_class"], "battery");
    }

    #[tokio::test]
    async fn test_last_message_sensor() {
        let harness = harness().await;
        let sensor = LastMessageSensor::new(harness.coordinator.clone(), TEST_DEVICE_ID);

        assert_eq!(sensor.state().await, "pick me up");
        let attributes = sensor.attributes().await;
        assert_eq!(attributes["sender"], "WATCH");
        assert_eq!(attributes["is_read"], false);
    }

    #[tokio::test]
    async fn test_next_alarm_skips_disabled() {
        let harness = harness().await;
        let sensor = NextAlarmSensor::new(harness.coordinator.clone(), TEST_DEVICE_ID);

        // 06:15 exists but is disabled; 07:30 is the next enabled alarm
        assert_eq!(sensor.state().await, "07:30");
        let attributes = sensor.attributes().await;
        assert_eq!(attributes["alarm_count"], 2);
        assert_eq!(attributes["enabled_count"], 1);
        assert!(attributes["next_alarm_days"]
            .as_str()
            .unwrap()
            .contains("MON"));
    }

    #[tokio::test]
    async fn test_tracking_mode_sensor() {
        let harness = harness().await;
        let sensor = TrackingModeSensor::new(harness.coordinator.clone(), TEST_DEVICE_ID);
        assert_eq!(sensor.state().await, "NORMAL");
    }

    #[tokio::test]
    async fn test_unknown_device_is_unavailable() {
        let harness = harness().await;
        let sensor = BatterySensor::new(harness.coordinator.clone(), "ghost");
        assert!(!sensor.available().await);
        assert_eq!(sensor.state().await, "unknown");
    }
}
