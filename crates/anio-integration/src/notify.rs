//! Notify platform: send chat messages to the watch

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use anio_api::{AnioApiClient, ApiResult, DEFAULT_MAX_MESSAGE_LENGTH};
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_core::STATE_UNKNOWN;

use crate::entity::{AnioEntity, Entity};

const PLATFORM: &str = "notify";

/// How to deliver a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Text,
    /// The message content is an emoji code (E01..E12)
    Emoji,
}

/// Sends text and emoji messages to one watch
pub struct NotifyEntity {
    base: AnioEntity,
    client: Arc<AnioApiClient>,
}

impl NotifyEntity {
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

    /// Send a message; empty messages are silently dropped
    ///
    /// The text length limit comes from the device config when known.
    pub async fn send_message(
        &self,
        message: &str,
        kind: MessageKind,
        username: Option<&str>,
    ) -> ApiResult<()> {
        if message.trim().is_empty() {
            debug!("skipping empty message");
            return Ok(());
        }

        let device_id = self.base.device_id();

        match kind {
            MessageKind::Emoji => {
                self.client
                    .send_emoji_message(device_id, message, username)
                    .await?;
            }
            MessageKind::Text => {
                let max_length = self
                    .base
                    .device_state()
                    .await
                    .map(|state| state.device.config.max_chat_message_length)
                    .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH);
                self.client
                    .send_text_message(device_id, message, username, max_length)
                    .await?;
            }
        }

        info!(device_id, "message sent");
        Ok(())
    }
}

#[async_trait]
impl Entity for NotifyEntity {
    fn unique_id(&self) -> String {
        format!("{}_notify", self.base.device_id())
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn name(&self) -> String {
        format!("{} Message", self.base.device_name().await)
    }

    async fn state(&self) -> String {
        STATE_UNKNOWN.to_string()
    }

    async fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([("icon".to_string(), json!("mdi:message-arrow-right"))])
    }

    async fn available(&self) -> bool {
        self.base.available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, TEST_DEVICE_ID};
    use anio_api::AnioApiError;

    #[tokio::test]
    async fn test_send_text_message() {
        let harness = harness().await;
        let notify = NotifyEntity::new(
            harness.coordinator.clone(),
            harness.client.clone(),
            TEST_DEVICE_ID,
        );

        notify
            .send_message("dinner is ready", MessageKind::Text, Some("Mama"))
            .await
            .unwrap();

        let calls = harness.recorder.calls();
        let sent = calls
            .iter()
            .find(|call| call.starts_with("POST /v1/chat/message/text"))
            .unwrap();
        assert!(sent.contains("dinner is ready"));
        assert!(sent.contains("Mama"));
    }

    #[tokio::test]
    async fn test_send_emoji_message() {
        let harness = harness().await;
        let notify = NotifyEntity::new(
            harness.coordinator.clone(),
            harness.client.clone(),
            TEST_DEVICE_ID,
        );

        notify
            .send_message("E03", MessageKind::Emoji, None)
            .await
            .unwrap();

        assert!(harness
            .recorder
            .calls()
            .iter()
            .any(|call| call.starts_with("POST /v1/chat/message/emoji")));
    }

    #[tokio::test]
    async fn test_empty_message_is_dropped() {
        let harness = harness().await;
        let notify = NotifyEntity::new(
            harness.coordinator.clone(),
            harness.client.clone(),
            TEST_DEVICE_ID,
        );

        notify
            .send_message("   ", MessageKind::Text, None)
            .await
            .unwrap();

        assert!(harness.recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_too_long_message_uses_device_limit() {
        let harness = harness().await;
        let notify = NotifyEntity::new(
            harness.coordinator.clone(),
            harness.client.clone(),
            TEST_DEVICE_ID,
        );

        // The mock device config leaves the default limit of 95 in place
        let text = "x".repeat(96);
        let err = notify
            .send_message(&text, MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnioApiError::MessageTooLong { .. }));
        assert!(harness.recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_entity_name_includes_device() {
        let harness = harness().await;
        let notify = NotifyEntity::new(
            harness.coordinator.clone(),
            harness.client.clone(),
            TEST_DEVICE_ID,
        );
        assert_eq!(notify.name().await, "Marla Message");
    }
}
