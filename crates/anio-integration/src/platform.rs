//! Entity assembly and state publishing
//!
//! After every completed poll cycle the publisher renders each entity into a
//! State snapshot and fires a state_changed event for everything that
//! actually changed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace};

use anio_api::AnioApiClient;
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::events::StateChangedData;
use anio_core::{Context, EntityId, State, STATE_UNAVAILABLE};
use anio_event_bus::SharedEventBus;

use crate::binary_sensor::binary_sensors_for;
use crate::button::buttons_for;
use crate::device_tracker::DeviceTracker;
use crate::entity::Entity;
use crate::notify::NotifyEntity;
use crate::select::RingProfileSelect;
use crate::sensor::sensors_for;
use crate::switch::SilenceTimeSwitch;

/// Build every platform's entities for the devices the coordinator knows
pub async fn entities_for_entry(
    coordinator: Arc<AnioDataUpdateCoordinator>,
    client: Arc<AnioApiClient>,
) -> Vec<Box<dyn Entity>> {
    let mut entities: Vec<Box<dyn Entity>> = Vec::new();

    let mut device_ids = coordinator.device_ids().await;
    device_ids.sort();

    for device_id in &device_ids {
        entities.extend(sensors_for(coordinator.clone(), device_id));
        entities.extend(binary_sensors_for(coordinator.clone(), device_id).await);
        entities.push(Box::new(DeviceTracker::new(coordinator.clone(), device_id)));
        entities.extend(buttons_for(
            coordinator.clone(),
            client.clone(),
            device_id,
        ));
        entities.push(Box::new(NotifyEntity::new(
            coordinator.clone(),
            client.clone(),
            device_id,
        )));
        entities.push(Box::new(SilenceTimeSwitch::new(
            coordinator.clone(),
            client.clone(),
            device_id,
        )));
        entities.push(Box::new(RingProfileSelect::new(
            coordinator.clone(),
            client.clone(),
            device_id,
        )));
    }

    entities
}

/// Renders entities into State snapshots and fires state_changed events
pub struct StatePublisher {
    bus: SharedEventBus,
    entities: Vec<Box<dyn Entity>>,
    last_states: HashMap<EntityId, State>,
}

impl StatePublisher {
    pub fn new(bus: SharedEventBus, entities: Vec<Box<dyn Entity>>) -> Self {
        Self {
            bus,
            entities,
            last_states: HashMap::new(),
        }
    }

    /// Number of entities under management
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Render every entity once; returns how many states changed
    pub async fn publish(&mut self) -> usize {
        let context = Context::new();
        let mut fired = 0;

        for entity in &self.entities {
            let entity_id = entity.entity_id();

            let value = if entity.available().await {
                entity.state().await
            } else {
                STATE_UNAVAILABLE.to_string()
            };
            let attributes = entity.attributes().await;

            let old_state = self.last_states.get(&entity_id).cloned();
            let new_state = match &old_state {
                Some(old) => old.with_update(value, attributes, context.child()),
                None => State::new(entity_id.clone(), value, attributes, context.child()),
            };

            let changed = old_state
                .as_ref()
                .map(|old| old != &new_state)
                .unwrap_or(true);

            if changed {
                trace!(entity_id = %entity_id, state = %new_state.state, "state changed");
                self.bus.fire_typed(
                    StateChangedData {
                        entity_id: entity_id.clone(),
                        old_state,
                        new_state: Some(new_state.clone()),
                    },
                    context.child(),
                );
                fired += 1;
            }

            self.last_states.insert(entity_id, new_state);
        }

        debug!(changed = fired, "published entity states");
        fired
    }

    /// Publish once for the current data, then on every completed poll cycle
    pub async fn run(mut self, mut updates: watch::Receiver<u64>) {
        self.publish().await;
        while updates.changed().await.is_ok() {
            self.publish().await;
        }
    }
}
