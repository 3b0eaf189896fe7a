//! Incoming message processing
//!
//! Scans the activity feed for chat messages, deduplicates them by id, and
//! fires a `anio_message_received` event for each new watch-to-app message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use tracing::debug;

use anio_api::ActivityItem;
use anio_core::events::MessageReceivedData;
use anio_core::Context;
use anio_event_bus::EventBus;

/// Stop growing the seen-id set past this many entries
const MAX_SEEN_MESSAGES: usize = 1000;
/// When the cap is hit, keep only this many of the newest ids
const TRIM_SEEN_MESSAGES_TO: usize = 500;

/// Tracks which message ids have already been processed
///
/// The set is insertion-ordered so trimming drops the oldest ids first.
#[derive(Debug, Default)]
pub struct MessageTracker {
    seen: IndexSet<String>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remembered message ids
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Process activity items, firing an event per new watch message
    ///
    /// Returns how many events were fired.
    pub fn process(
        &mut self,
        activity: &[ActivityItem],
        device_names: &HashMap<String, String>,
        bus: &EventBus,
        context: &Context,
    ) -> usize {
        let mut fired = 0;

        for item in activity {
            if item.item_type != "MESSAGE" {
                continue;
            }
            let Some(data) = &item.data else { continue };

            let message_id = data.get("id").and_then(|v| v.as_str());
            if let Some(id) = message_id {
                if self.seen.contains(id) {
                    continue;
                }
            }

            if data.get("sender").and_then(|v| v.as_str()) == Some("WATCH") {
                let device_id = data
                    .get("deviceId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let device_name = device_names
                    .get(&device_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string());
                let content = data
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                let preview: String = content.chars().take(20).collect();
                debug!(device_name, preview, "firing message event");

                bus.fire_typed(
                    MessageReceivedData {
                        device_id,
                        device_name,
                        message_type: data
                            .get("type")
                            .and_then(|v| v.as_str())
                            .unwrap_or("TEXT")
                            .to_string(),
                        content,
                        sender: "WATCH".to_string(),
                        timestamp: data
                            .get("createdAt")
                            .and_then(|v| v.as_str())
                            .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
                    },
                    context.child(),
                );
                fired += 1;
            }

            if let Some(id) = message_id {
                self.seen.insert(id.to_string());

                if self.seen.len() > MAX_SEEN_MESSAGES {
                    let keep_from = self.seen.len() - TRIM_SEEN_MESSAGES_TO;
                    self.seen = self.seen.split_off(keep_from);
                }
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_item(activity_id: &str, message_id: &str, sender: &str) -> ActivityItem {
        serde_json::from_value(serde_json::json!({
            "id": activity_id,
            "deviceId": "4645a84ad7",
            "type": "MESSAGE",
            "timestamp": "2026-01-10T10:00:00Z",
            "data": {
                "id": message_id,
                "deviceId": "4645a84ad7",
                "sender": sender,
                "type": "TEXT",
                "text": "where are you?",
                "createdAt": "2026-01-10T10:00:00Z",
            },
        }))
        .unwrap()
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([("4645a84ad7".to_string(), "Marla".to_string())])
    }

    #[tokio::test]
    async fn test_same_message_id_fires_exactly_once() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<MessageReceivedData>();
        let mut tracker = MessageTracker::new();

        let activity = vec![message_item("act1", "msg1", "WATCH")];
        let context = Context::new();

        assert_eq!(tracker.process(&activity, &names(), &bus, &context), 1);
        // Same feed again, e.g. the next poll cycle
        assert_eq!(tracker.process(&activity, &names(), &bus, &context), 0);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.data.device_name, "Marla");
        assert_eq!(event.data.content, "where are you?");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_app_messages_marked_seen_but_not_fired() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<MessageReceivedData>();
        let mut tracker = MessageTracker::new();

        let activity = vec![message_item("act1", "msg1", "APP")];
        assert_eq!(tracker.process(&activity, &names(), &bus, &Context::new()), 0);
        assert_eq!(tracker.seen_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_device_name_falls_back() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<MessageReceivedData>();
        let mut tracker = MessageTracker::new();

        let activity = vec![message_item("act1", "msg1", "WATCH")];
        tracker.process(&activity, &HashMap::new(), &bus, &Context::new());

        assert_eq!(rx.try_recv().unwrap().data.device_name, "Unknown");
    }

    #[tokio::test]
    async fn test_non_message_items_ignored() {
        let bus = EventBus::new();
        let mut tracker = MessageTracker::new();

        let item: ActivityItem = serde_json::from_value(serde_json::json!({
            "id": "act1",
            "deviceId": "4645a84ad7",
            "type": "LOCATION",
            "timestamp": "2026-01-10T10:00:00Z",
            "data": {"lat": 52.52, "lng": 13.405},
        }))
        .unwrap();

        assert_eq!(tracker.process(&[item], &names(), &bus, &Context::new()), 0);
        assert_eq!(tracker.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_seen_set_trims_oldest() {
        let bus = EventBus::new();
        let mut tracker = MessageTracker::new();

        for i in 0..=MAX_SEEN_MESSAGES {
            let activity = vec![message_item("act", &format!("msg{i}"), "APP")];
            tracker.process(&activity, &names(), &bus, &Context::new());
        }

        assert_eq!(tracker.seen_count(), TRIM_SEEN_MESSAGES_TO);
        // The newest ids survive the trim
        assert!(tracker.seen.contains(&format!("msg{MAX_SEEN_MESSAGES}")));
        assert!(!tracker.seen.contains("msg0"));
    }
}
