//! Switch platform: silence times

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use anio_api::{AnioApiClient, ApiResult};
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "switch";

/// Toggles the watch's silence time windows as a group
///
/// On when any configured window is enabled.
pub struct SilenceTimeSwitch {
    base: AnioEntity,
    client: Arc<AnioApiClient>,
}

impl SilenceTimeSwitch {
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

    /// True when any silence window is enabled
    pub async fn is_on(&self) -> bool {
        self.base
            .device_state()
            .await
            .map(|state| state.silence_times.iter().any(|window| window.enabled))
            .unwrap_or(false)
    }

    /// Enable all silence windows, then refresh
    pub async fn turn_on(&self) -> ApiResult<()> {
        self.client
            .enable_silence_times(self.base.device_id())
            .await?;
        self.base.coordinator().request_refresh();
        Ok(())
    }

    /// Disable all silence windows, then refresh
    pub async fn turn_off(&self) -> ApiResult<()> {
        self.client
            .disable_silence_times(self.base.device_id())
            .await?;
        self.base.coordinator().request_refresh();
        Ok(())
    }
}

#[async_trait]
impl Entity for SilenceTimeSwitch {
    fn unique_id(&self) -> String {
        format!("{}_silence_time", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        "Silence Time".to_string()
    }

    async fn state(&self) -> String {
        match self.base.device_state().await {
            Some(state) => {
                if state.silence_times.iter().any(|window| window.enabled) {
                    "on".to_string()
                } else {
                    "off".to_string()
                }
            }
            None => STATE_UNKNOWN.to_string(),
        }
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([
            ("icon".to_string(), json!("mdi:volume-off")),
            ("entity_category".to_string(), json!("config")),
        ]);

        if let Some(state) = self.base.device_state().await {
            let periods: Vec<Value> = state
                .silence_times
                .iter()
                .map(|window| {
                    json!({
                        "start": window.start_time,
                        "end": window.end_time,
                        "days": window.days.join(", "),
                        "enabled": window.enabled,
                    })
                })
                .collect();

            attributes.insert(
                "silence_time_count".to_string(),
                json!(state.silence_times.len()),
            );
            attributes.insert("periods".to_string(), json!(periods));
        }

        attributes
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}
