//! Event bus for the ANIO integration
//!
//! Carries the integration's events (incoming watch messages, entity state
//! changes) from the coordinator to whoever subscribed: automations, tests,
//! the host surface.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use anio_core::{Context, Event, EventData, EventType};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Pub/sub broker keyed by event type
pub struct EventBus {
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the given channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "subscribing to event type");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to a typed event, receiving parsed payloads
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Fire an event to all subscribers of its type
    ///
    /// A send error only means there are no active receivers; it is ignored.
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            let _ = sender.send(event);
        }
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let json_data = serde_json::to_value(&data).unwrap_or_default();
        self.fire(Event::new(T::event_type(), json_data, context));
    }

    /// Number of event types with at least one subscription so far
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the event bus
pub type SharedEventBus = Arc<EventBus>;

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose payload parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
            // Payload didn't parse as T; wait for the next event
        }
    }

    /// Non-blocking receive, for draining in tests
    pub fn try_recv(&mut self) -> Result<Event<T>, broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anio_core::events::{MessageReceivedData, MESSAGE_RECEIVED};
    use serde_json::json;

    fn message_data(content: &str) -> MessageReceivedData {
        MessageReceivedData {
            device_id: "4645a84ad7".to_string(),
            device_name: "Marla".to_string(),
            message_type: "TEXT".to_string(),
            content: content.to_string(),
            sender: "WATCH".to_string(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(MESSAGE_RECEIVED);

        bus.fire(Event::new(
            MESSAGE_RECEIVED,
            json!({"content": "hi"}),
            Context::new(),
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), MESSAGE_RECEIVED);
        assert_eq!(received.data["content"], "hi");
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<MessageReceivedData>();

        bus.fire_typed(message_data("where are you?"), Context::new());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.content, "where are you?");
        assert_eq!(received.data.sender, "WATCH");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe_typed::<MessageReceivedData>();
        let mut rx2 = bus.subscribe_typed::<MessageReceivedData>();

        bus.fire_typed(message_data("hello"), Context::new());

        assert_eq!(rx1.recv().await.unwrap().data.content, "hello");
        assert_eq!(rx2.recv().await.unwrap().data.content, "hello");
    }

    #[tokio::test]
    async fn test_no_cross_event_delivery() {
        let bus = EventBus::new();
        let mut message_rx = bus.subscribe(MESSAGE_RECEIVED);
        let mut other_rx = bus.subscribe("state_changed");

        bus.fire(Event::new(MESSAGE_RECEIVED, json!({}), Context::new()));

        assert!(message_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fire_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.fire(Event::new(MESSAGE_RECEIVED, json!({}), Context::new()));
        assert_eq!(bus.listener_count(), 0);
    }
}
