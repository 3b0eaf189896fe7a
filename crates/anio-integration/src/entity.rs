//! Base entity plumbing shared by all platforms

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use anio_api::AnioDeviceState;
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::{EntityId, DOMAIN, STATE_UNKNOWN};

/// An entity exposed by the integration
///
/// Entities read the coordinator's per-device state and render it as a
/// state string plus attributes. Command entities (buttons, notify, switch,
/// select) additionally carry inherent async methods.
#[async_trait]
pub trait Entity: Send + Sync {
    /// Stable unique id, `{device_id}_{suffix}`
    fn unique_id(&self) -> String;

    /// Platform this entity belongs to (sensor, binary_sensor, ...)
    fn platform(&self) -> &'static str;

    /// Display name
    async fn name(&self) -> String;

    /// Current state value
    async fn state(&self) -> String;

    /// Extra state attributes
    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    /// Whether the backing device is present and the last poll succeeded
    async fn available(&self) -> bool;

    /// The entity id derived from platform and unique id
    fn entity_id(&self) -> EntityId {
        EntityId::new(self.platform(), slugify(&self.unique_id()))
            .expect("slugified object id is always valid")
    }
}

/// Turn an arbitrary string into a valid entity object id
pub fn slugify(value: &str) -> String {
    let slug: String = value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

/// Device registry info rendered from the device state
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: Option<String>,
    pub sw_version: Option<String>,
}

/// Shared base for per-device entities
#[derive(Clone)]
pub struct AnioEntity {
    coordinator: Arc<AnioDataUpdateCoordinator>,
    device_id: String,
}

impl AnioEntity {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: impl Into<String>) -> Self {
        Self {
            coordinator,
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn coordinator(&self) -> &Arc<AnioDataUpdateCoordinator> {
        &self.coordinator
    }

    /// Current device state from the coordinator data
    pub async fn device_state(&self) -> Option<AnioDeviceState> {
        self.coordinator.device_state(&self.device_id).await
    }

    /// Entity availability: last poll succeeded and the device exists
    pub async fn available(&self) -> bool {
        self.coordinator.last_update_success() && self.device_state().await.is_some()
    }

    /// Device display name, falling back to a shortened id
    pub async fn device_name(&self) -> String {
        match self.device_state().await {
            Some(state) => state.name().to_string(),
            None => format!("ANIO {}", &self.device_id[..self.device_id.len().min(8)]),
        }
    }

    /// Device registry info
    pub async fn device_info(&self) -> DeviceInfo {
        match self.device_state().await {
            Some(state) => DeviceInfo {
                identifiers: (DOMAIN.to_string(), state.device.id.clone()),
                name: state.device.settings.name.clone(),
                manufacturer: "ANIO".to_string(),
                model: Some(format!("Generation {}", state.device.config.generation)),
                sw_version: Some(state.device.config.firmware_version.clone()),
            },
            None => DeviceInfo {
                identifiers: (DOMAIN.to_string(), self.device_id.clone()),
                name: self.device_name().await,
                manufacturer: "ANIO".to_string(),
                model: None,
                sw_version: None,
            },
        }
    }
}

/// Render an optional value as a state string
pub fn state_or_unknown<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| STATE_UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("4645a84ad7_battery"), "4645a84ad7_battery");
        assert_eq!(slugify("Marla's Watch"), "marla_s_watch");
        assert_eq!(slugify("__weird__"), "weird");
        assert_eq!(slugify("!!!"), "unknown");
        assert_eq!(slugify(""), "unknown");
    }

    #[test]
    fn test_state_or_unknown() {
        assert_eq!(state_or_unknown(Some(85)), "85");
        assert_eq!(state_or_unknown::<i64>(None), "unknown");
    }
}
