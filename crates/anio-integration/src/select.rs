//! Select platform: ring profile

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use anio_api::{AnioApiClient, AnioApiError, ApiResult, SettingsPatch};
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "select";

/// Ring profiles the watch supports
pub const RING_PROFILES: [&str; 4] = [
    "RING_AND_VIBRATE",
    "RING_ONLY",
    "VIBRATE_ONLY",
    "SILENT",
];

/// Chooses how the watch rings
pub struct RingProfileSelect {
    base: AnioEntity,
    client: Arc<AnioApiClient>,
}

impl RingProfileSelect {
    pub fn new(
        coordinator: Arc<AnioDataUpdateCoordinator>,
        client: Arc<AnioApiClient>,
        device_id: &str,
    ) -> Self {
        Self {
            base: AnioEntity::new(coordinator, device_id),
            client,
        }
    }

    /// The currently active profile
    pub async fn current_option(&self) -> Option<String> {
        self.base
            .device_state()
            .await
            .map(|state| state.device.settings.ring_profile)
    }

    /// Change the ring profile, then refresh
    pub async fn select_option(&self, option: &str) -> ApiResult<()> {
        if !RING_PROFILES.contains(&option) {
            return Err(AnioApiError::Api {
                status: 400,
                message: format!("unknown ring profile: {option}"),
            });
        }

        self.client
            .update_settings(self.base.device_id(), &SettingsPatch::ring_profile(option))
            .await?;
        self.base.coordinator().request_refresh();
        Ok(())
    }
}

#[async_trait]
impl Entity for RingProfileSelect {
    fn unique_id(&self) -> String {
        format!("{}_ring_profile", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Ring Profile".to_string()
    }

    async fn state(&self) -> String {
        self.current_option()
            .await
            .unwrap_or_else(|| STATE_UNKNOWN.to_string())
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("icon".to_string(), json!("mdi:bell-ring")),
            ("entity_category".to_string(), json!("config")),
            ("options".to_string(), json!(RING_PROFILES)),
        ])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}
