//! Binary sensor platform: online status and per-geofence presence

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use anio_api::Geofence;
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "binary_sensor";

const STATE_ON: &str = "on";
const STATE_OFF: &str = "off";

/// Binary sensors for one device: online plus one presence sensor per fence
pub async fn binary_sensors_for(
    coordinator: Arc<AnioDataUpdateCoordinator>,
    device_id: &str,
) -> Vec<Box<dyn Entity>> {
    let mut entities: Vec<Box<dyn Entity>> =
        vec![Box::new(OnlineSensor::new(coordinator.clone(), device_id))];

    for geofence in coordinator.geofences().await {
        entities.push(Box::new(GeofenceSensor::new(
            coordinator.clone(),
            device_id,
            geofence,
        )));
    }

    entities
}

/// Whether the watch has answered the cloud recently
pub struct OnlineSensor {
    base: AnioEntity,
}

impl OnlineSensor {
    pub fn new(coordinator: Arc<AnioDataUpdateCoordinator>, device_id: &str) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
        }
    }
}

#[async_trait]
impl Entity for OnlineSensor {
    fn unique_id(&self) -> String {
        format!("{}_online", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        format!("{} Online", self.base.device_name().await)
    }

    async fn state(&self) -> String {
        match self.base.device_state().await {
            Some(state) if state.is_online => STATE_ON.to_string(),
            Some(_) => STATE_OFF.to_string(),
            None => STATE_UNKNOWN.to_string(),
        }
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("device_class".to_string(), json!("connectivity")),
            ("entity_category".to_string(), json!("diagnostic")),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

/// Whether the watch is inside one specific geofence
pub struct GeofenceSensor {
    base: AnioEntity,
    geofence: Geofence,
}

impl GeofenceSensor {
    pub fn new(
        coordinator: Arc<AnioDataUpdateCoordinator>,
        device_id: &str,
        geofence: Geofence,
    ) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
            geofence,
        }
    }

    /// The fence this sensor watches
    pub fn geofence(&self) -> &Geofence {
        &self.geofence
    }
}

#[async_trait]
impl Entity for GeofenceSensor {
    fn unique_id(&self) -> String {
        format!("{}_geofence_{}", self.base.device_id(), self.geofence.id)
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        format!("{} at {}", self.base.device_name().await, self.geofence.name)
    }

    async fn state(&self) -> String {
        let inside = self
            .base
            .coordinator()
            .is_device_in_geofence(self.base.device_id(), &self.geofence.id)
            .await;
        if inside {
            STATE_ON.to_string()
        } else {
            STATE_OFF.to_string()
        }
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("device_class".to_string(), json!("presence")),
            ("geofence_name".to_string(), json!(self.geofence.name)),
            ("latitude".to_string(), json!(self.geofence.latitude)),
            ("longitude".to_string(), json!(self.geofence.longitude)),
            ("radius_meters".to_string(), json!(self.geofence.radius)),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}
