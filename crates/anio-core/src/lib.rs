//! Core types for the ANIO smartwatch integration
//!
//! This crate provides the fundamental types shared across the workspace:
//! EntityId, State, Event, Context, and the integration's event payloads.

mod context;
mod entity_id;
mod event;
mod state;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;

/// Integration domain, used for entry ids and event names
pub const DOMAIN: &str = "anio";

/// Maximum length for a state value
pub const MAX_STATE_LENGTH: usize = 255;

/// State value for an entity whose backing device is missing
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value for an entity with no reading yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Event types fired by the integration
pub mod events {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Fired when a new chat message arrives from a watch
    pub const MESSAGE_RECEIVED: &str = "anio_message_received";

    /// Fired when an entity state is written after a poll cycle
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for MESSAGE_RECEIVED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct MessageReceivedData {
        pub device_id: String,
        pub device_name: String,
        pub message_type: String,
        pub content: String,
        pub sender: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub timestamp: Option<DateTime<Utc>>,
    }

    impl EventData for MessageReceivedData {
        fn event_type() -> &'static str {
            MESSAGE_RECEIVED
        }
    }

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::events::*;
    use super::*;

    #[test]
    fn test_typed_event_carries_event_type() {
        let data = MessageReceivedData {
            device_id: "4645a84ad7".to_string(),
            device_name: "Marla".to_string(),
            message_type: "TEXT".to_string(),
            content: "hi".to_string(),
            sender: "WATCH".to_string(),
            timestamp: None,
        };
        let event = Event::typed(data, Context::new());
        assert_eq!(event.event_type.as_str(), MESSAGE_RECEIVED);
        assert_eq!(event.data.device_name, "Marla");
    }

    #[test]
    fn test_message_data_serde_round_trip() {
        let data = MessageReceivedData {
            device_id: "4645a84ad7".to_string(),
            device_name: "Marla".to_string(),
            message_type: "EMOJI".to_string(),
            content: "E03".to_string(),
            sender: "WATCH".to_string(),
            timestamp: Some(chrono::Utc::now()),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["sender"], "WATCH");
        let parsed: MessageReceivedData = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.content, "E03");
    }
}
