//! Button platform: locate, power off, flower

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use anio_api::{AnioApiClient, ApiResult};
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "button";

/// Which command a button fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    /// Ask the watch for a fresh location fix
    Locate,
    /// Turn the watch off
    PowerOff,
    /// Send a flower (praise) to the watch
    Flower,
}

impl ButtonKind {
    fn suffix(self) -> &'static str {
        match self {
            ButtonKind::Locate => "locate",
            ButtonKind::PowerOff => "power_off",
            ButtonKind::Flower => "flower",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            ButtonKind::Locate => "Locate",
            ButtonKind::PowerOff => "Power Off",
            ButtonKind::Flower => "Flower",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            ButtonKind::Locate => "mdi:crosshairs-gps",
            ButtonKind::PowerOff => "mdi:power",
            ButtonKind::Flower => "mdi:flower",
        }
    }
}

/// All buttons for one device
pub fn buttons_for(
    coordinator: Arc<AnioDataUpdateCoordinator>,
    client: Arc<AnioApiClient>,
    device_id: &str,
) -> Vec<Box<dyn Entity>> {
    [ButtonKind::Locate, ButtonKind::PowerOff, ButtonKind::Flower]
        .into_iter()
        .map(|kind| {
            Box::new(AnioButton::new(
                coordinator.clone(),
                client.clone(),
                device_id,
                kind,
            )) as Box<dyn Entity>
        })
        .collect()
}

/// A command button; the state is the last press timestamp
pub struct AnioButton {
    base: AnioEntity,
    client: Arc<AnioApiClient>,
    kind: ButtonKind,
    last_pressed: Mutex<Option<DateTime<Utc>>>,
}

impl AnioButton {
    pub fn new(
        coordinator: Arc<AnioDataUpdateCoordinator>,
        client: Arc<AnioApiClient>,
        device_id: &str,
        kind: ButtonKind,
    ) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
            client,
            kind,
            last_pressed: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ButtonKind {
        self.kind
    }

    /// Fire the command, then ask for an out-of-band refresh
    pub async fn press(&self) -> ApiResult<()> {
        let device_id = self.base.device_id();

        match self.kind {
            ButtonKind::Locate => {
                info!(device_id, "requesting location");
                self.client.find_device(device_id).await?;
            }
            ButtonKind::PowerOff => {
                warn!(device_id, "power off requested, this turns the watch off");
                self.client.power_off_device(device_id).await?;
            }
            ButtonKind::Flower => {
                self.client.send_flower(device_id).await?;
            }
        }

        *self.last_pressed.lock().await = Some(Utc::now());
        self.base.coordinator().request_refresh();
        Ok(())
    }
}

#[async_trait]
impl Entity for AnioButton {
    fn unique_id(&self) -> String {
        format!("{}_{}", self.base.device_id(), self.kind.suffix())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        self.kind.display_name().to_string()
    }

    async fn state(&self) -> String {
        match *self.last_pressed.lock().await {
            Some(pressed) => pressed.to_rfc3339(),
            None => STATE_UNKNOWN.to_string(),
        }
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([("icon".to_string(), json!(self.kind.icon()))]);
        if self.kind == ButtonKind::PowerOff {
            attributes.insert("device_class".to_string(), json!("restart"));
            attributes.insert("entity_category".to_string(), json!("config"));
        } else if self.kind == ButtonKind::Locate {
            attributes.insert("entity_category".to_string(), json!("diagnostic"));
        }
        attributes
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}
