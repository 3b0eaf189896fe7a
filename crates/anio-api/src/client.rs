//! REST client for the ANIO Cloud API
//!
//! All endpoint methods go through one shared request path: bearer token
//! from the auth handler, `app-uuid` header, JSON bodies. 429 responses are
//! retried with Retry-After or exponential backoff up to a fixed ceiling;
//! 401 raises the auth error, 404 the not-found error (which some callers
//! reinterpret as an empty list).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::AnioAuth;
use crate::error::{AnioApiError, ApiResult};
use crate::models::{
    ActivityItem, AlarmClock, ChatMessage, Device, DeviceLocation, Geofence, LocationInfo,
    SettingsPatch, SilenceTime,
};
use crate::{is_valid_emoji_code, API_URL, RATE_LIMIT_BACKOFF_BASE, RATE_LIMIT_MAX_RETRIES};

/// Client for the ANIO Cloud API
pub struct AnioApiClient {
    http: reqwest::Client,
    auth: Arc<AnioAuth>,
    base_url: String,
    backoff_base_secs: u64,
    max_retries: u32,
    retry_count: AtomicU32,
}

impl AnioApiClient {
    /// Create a client sharing the given auth handler
    pub fn new(http: reqwest::Client, auth: Arc<AnioAuth>) -> Self {
        Self {
            http,
            auth,
            base_url: API_URL.to_string(),
            backoff_base_secs: RATE_LIMIT_BACKOFF_BASE,
            max_retries: RATE_LIMIT_MAX_RETRIES,
            retry_count: AtomicU32::new(0),
        }
    }

    /// Point the client at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the exponential backoff base (seconds)
    pub fn with_backoff(mut self, backoff_base_secs: u64) -> Self {
        self.backoff_base_secs = backoff_base_secs;
        self
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> ApiResult<Option<Value>> {
        loop {
            let token = self.auth.ensure_valid_token().await?;

            let mut request = self
                .http
                .request(method.clone(), format!("{}{}", self.base_url, path))
                .bearer_auth(&token)
                .header("app-uuid", self.auth.app_uuid());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(payload) = &body {
                request = request.json(payload);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                self.handle_rate_limit(retry_after).await?;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(AnioApiError::Auth("request was unauthorized".to_string()));
            }

            if status == StatusCode::NOT_FOUND {
                return Err(AnioApiError::NotFound(path.to_string()));
            }

            if status.is_client_error() || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                return Err(AnioApiError::Api {
                    status: status.as_u16(),
                    message: text,
                });
            }

            self.retry_count.store(0, Ordering::SeqCst);

            if status == StatusCode::NO_CONTENT {
                return Ok(None);
            }

            let text = response.text().await?;
            if text.is_empty() {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_str(&text)?));
        }
    }

    async fn handle_rate_limit(&self, retry_after: Option<u64>) -> ApiResult<()> {
        let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt > self.max_retries {
            self.retry_count.store(0, Ordering::SeqCst);
            return Err(AnioApiError::RateLimit { retry_after });
        }

        let wait_secs = retry_after.unwrap_or_else(|| self.backoff_base_secs.pow(attempt));
        warn!(
            wait_secs,
            attempt,
            max = self.max_retries,
            "rate limited, backing off"
        );
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        Ok(())
    }

    fn parse_list<T: DeserializeOwned>(value: Option<Value>) -> ApiResult<Vec<T>> {
        match value {
            Some(v @ Value::Array(_)) => Ok(serde_json::from_value(v)?),
            _ => Ok(Vec::new()),
        }
    }

    /// All devices registered to the authenticated account
    pub async fn get_devices(&self) -> ApiResult<Vec<Device>> {
        let value = self
            .request(Method::GET, "/v1/device/list", None, &[])
            .await?;
        Self::parse_list(value)
    }

    /// A single device by id
    pub async fn get_device(&self, device_id: &str) -> ApiResult<Device> {
        let value = self
            .request(Method::GET, &format!("/v1/device/{device_id}"), None, &[])
            .await
            .map_err(|err| match err {
                AnioApiError::NotFound(_) => AnioApiError::NotFound(device_id.to_string()),
                other => other,
            })?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// Ask the watch to report its current location
    pub async fn find_device(&self, device_id: &str) -> ApiResult<()> {
        self.request(
            Method::POST,
            &format!("/v1/device/{device_id}/find"),
            None,
            &[],
        )
        .await?;
        debug!(device_id, "location request sent");
        Ok(())
    }

    /// Turn the watch off remotely
    pub async fn power_off_device(&self, device_id: &str) -> ApiResult<()> {
        self.request(
            Method::POST,
            &format!("/v1/device/{device_id}/poweroff"),
            None,
            &[],
        )
        .await?;
        info!(device_id, "power off command sent");
        Ok(())
    }

    /// Send a flower (praise) to the watch
    pub async fn send_flower(&self, device_id: &str) -> ApiResult<()> {
        self.request(
            Method::POST,
            &format!("/v1/device/{device_id}/flower"),
            None,
            &[],
        )
        .await?;
        Ok(())
    }

    /// Apply a partial settings update to the watch
    pub async fn update_settings(&self, device_id: &str, patch: &SettingsPatch) -> ApiResult<()> {
        self.request(
            Method::PUT,
            &format!("/v1/device/{device_id}/settings"),
            Some(serde_json::to_value(patch)?),
            &[],
        )
        .await?;
        Ok(())
    }

    /// Current tracking mode of the watch, if the API reports one
    pub async fn get_tracking_mode(&self, device_id: &str) -> ApiResult<Option<String>> {
        let value = match self
            .request(
                Method::GET,
                &format!("/v1/device/{device_id}/trackingMode"),
                None,
                &[],
            )
            .await
        {
            Ok(value) => value,
            Err(AnioApiError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };

        // The endpoint answers either {"trackingMode": "..."} or a bare string
        Ok(value.and_then(|v| {
            v.get("trackingMode")
                .and_then(Value::as_str)
                .or_else(|| v.as_str())
                .map(str::to_string)
        }))
    }

    /// Change the tracking mode of the watch
    pub async fn set_tracking_mode(&self, device_id: &str, mode: &str) -> ApiResult<()> {
        self.request(
            Method::PUT,
            &format!("/v1/device/{device_id}/trackingMode"),
            Some(serde_json::json!({ "trackingMode": mode })),
            &[],
        )
        .await?;
        Ok(())
    }

    /// Send a text message to the watch
    ///
    /// The length check runs before any network traffic.
    pub async fn send_text_message(
        &self,
        device_id: &str,
        text: &str,
        username: Option<&str>,
        max_length: usize,
    ) -> ApiResult<ChatMessage> {
        let length = text.chars().count();
        if length > max_length {
            return Err(AnioApiError::MessageTooLong { length, max_length });
        }

        let mut payload = serde_json::json!({
            "deviceId": device_id,
            "text": text,
        });
        if let Some(name) = username {
            payload["username"] = serde_json::json!(name);
        }

        let value = self
            .request(Method::POST, "/v1/chat/message/text", Some(payload), &[])
            .await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// Send an emoji message (codes E01..E12) to the watch
    pub async fn send_emoji_message(
        &self,
        device_id: &str,
        emoji_code: &str,
        username: Option<&str>,
    ) -> ApiResult<ChatMessage> {
        if !is_valid_emoji_code(emoji_code) {
            return Err(AnioApiError::InvalidEmoji(emoji_code.to_string()));
        }

        let mut payload = serde_json::json!({
            "deviceId": device_id,
            "text": emoji_code,
        });
        if let Some(name) = username {
            payload["username"] = serde_json::json!(name);
        }

        let value = self
            .request(Method::POST, "/v1/chat/message/emoji", Some(payload), &[])
            .await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// Chat history for a device, oldest first
    pub async fn get_chat_history(&self, device_id: &str) -> ApiResult<Vec<ChatMessage>> {
        match self
            .request(Method::GET, &format!("/v1/chat/{device_id}"), None, &[])
            .await
        {
            Ok(value) => Self::parse_list(value),
            Err(AnioApiError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Activity feed, optionally limited to items after `from_time`
    ///
    /// Items that fail to parse are skipped rather than failing the feed.
    pub async fn get_activity(
        &self,
        from_time: Option<DateTime<Utc>>,
    ) -> ApiResult<Vec<ActivityItem>> {
        let mut query = Vec::new();
        if let Some(from) = from_time {
            query.push(("from", from.to_rfc3339()));
        }

        let value = self
            .request(Method::GET, "/v1/activity", None, &query)
            .await?;
        let Some(Value::Array(items)) = value else {
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<ActivityItem>(item) {
                Ok(parsed) => result.push(parsed),
                Err(err) => debug!(error = %err, "skipping unparsable activity item"),
            }
        }
        Ok(result)
    }

    /// All geofences for the account; a 404 means none exist
    pub async fn get_geofences(&self) -> ApiResult<Vec<Geofence>> {
        match self.request(Method::GET, "/v1/geofence", None, &[]).await {
            Ok(value) => Self::parse_list(value),
            Err(AnioApiError::NotFound(_)) => {
                debug!("no geofences found (404 response)");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Location history for a device
    pub async fn get_location_history(&self, device_id: &str) -> ApiResult<Vec<DeviceLocation>> {
        match self
            .request(Method::GET, &format!("/v1/location/{device_id}"), None, &[])
            .await
        {
            Ok(value) => Self::parse_list(value),
            Err(AnioApiError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Most recent location fix for a device, if it has ever reported one
    pub async fn get_last_location(&self, device_id: &str) -> ApiResult<Option<DeviceLocation>> {
        match self
            .request(
                Method::GET,
                &format!("/v1/location/{device_id}/last"),
                None,
                &[],
            )
            .await
        {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(AnioApiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fallback location lookup via LOCATION items in the activity feed
    pub async fn location_from_activity(&self, device_id: &str) -> ApiResult<Option<LocationInfo>> {
        let activity = self.get_activity(None).await?;

        for item in activity {
            if item.device_id != device_id || item.item_type != "LOCATION" {
                continue;
            }
            let Some(data) = item.data else { continue };
            match serde_json::from_value::<LocationInfo>(data) {
                Ok(location) => return Ok(Some(location)),
                Err(err) => debug!(error = %err, "failed to parse location from activity"),
            }
        }

        Ok(None)
    }

    /// Alarm clocks configured on a device
    pub async fn get_alarms(&self, device_id: &str) -> ApiResult<Vec<AlarmClock>> {
        match self
            .request(
                Method::GET,
                &format!("/v1/alarm-clock/{device_id}"),
                None,
                &[],
            )
            .await
        {
            Ok(value) => Self::parse_list(value),
            Err(AnioApiError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Silence time windows configured on a device
    pub async fn get_silence_times(&self, device_id: &str) -> ApiResult<Vec<SilenceTime>> {
        match self
            .request(
                Method::GET,
                &format!("/v1/silence-time/{device_id}"),
                None,
                &[],
            )
            .await
        {
            Ok(value) => Self::parse_list(value),
            Err(AnioApiError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Enable all silence time windows on a device
    pub async fn enable_silence_times(&self, device_id: &str) -> ApiResult<()> {
        self.request(
            Method::POST,
            &format!("/v1/silence-time/{device_id}/enable"),
            None,
            &[],
        )
        .await?;
        Ok(())
    }

    /// Disable all silence time windows on a device
    pub async fn disable_silence_times(&self, device_id: &str) -> ApiResult<()> {
        self.request(
            Method::POST,
            &format!("/v1/silence-time/{device_id}/disable"),
            None,
            &[],
        )
        .await?;
        Ok(())
    }
}
