//! Entity ID type representing a platform.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("platform cannot be empty")]
    EmptyPlatform,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("entity_id parts must be lowercase alphanumeric with underscores, not starting or ending with an underscore")]
    InvalidChars,
}

/// An entity identifier such as `sensor.marla_battery`
///
/// The platform part names the entity platform (sensor, binary_sensor,
/// device_tracker, button, notify, switch, select); the object_id is built
/// from the device id and an entity suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    platform: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from platform and object_id parts
    pub fn new(
        platform: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let platform = platform.into();
        let object_id = object_id.into();

        if platform.is_empty() {
            return Err(EntityIdError::EmptyPlatform);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if !Self::is_valid_part(&platform) || !Self::is_valid_part(&object_id) {
            return Err(EntityIdError::InvalidChars);
        }

        Ok(Self {
            platform,
            object_id,
        })
    }

    /// Get the platform part of the entity ID
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Get the object_id part of the entity ID
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    fn is_valid_part(s: &str) -> bool {
        if s.starts_with('_') || s.ends_with('_') {
            return false;
        }
        s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 2 {
            return Err(EntityIdError::InvalidFormat);
        }
        Self::new(parts[0], parts[1])
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.platform, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entity_id() {
        let id = EntityId::new("sensor", "4645a84ad7_battery").unwrap();
        assert_eq!(id.platform(), "sensor");
        assert_eq!(id.object_id(), "4645a84ad7_battery");
        assert_eq!(id.to_string(), "sensor.4645a84ad7_battery");
    }

    #[test]
    fn test_parse_round_trip() {
        let id: EntityId = "binary_sensor.4645a84ad7_online".parse().unwrap();
        assert_eq!(id.platform(), "binary_sensor");
        assert_eq!(id.object_id(), "4645a84ad7_online");
    }

    #[test]
    fn test_rejects_bad_format() {
        assert_eq!(
            "no_separator".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat)
        );
        assert_eq!(
            "a.b.c".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat)
        );
    }

    #[test]
    fn test_rejects_bad_chars() {
        assert!(EntityId::new("Sensor", "battery").is_err());
        assert!(EntityId::new("sensor", "_battery").is_err());
        assert!(EntityId::new("sensor", "battery_").is_err());
        assert!(EntityId::new("", "battery").is_err());
        assert!(EntityId::new("sensor", "").is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = EntityId::new("device_tracker", "watch_location").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"device_tracker.watch_location\"");
        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
