//! Typed models for ANIO Cloud API responses
//!
//! These mirror the JSON payloads one to one. Field aliases map the API's
//! camelCase names; range checks and clamping happen during deserialization
//! so a constructed value is always in range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

fn clamp_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value.clamp(0, 100) as u8)
}

fn non_negative<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value.max(0) as u32)
}

fn check_latitude<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !(-90.0..=90.0).contains(&value) {
        return Err(serde::de::Error::custom(
            "latitude must be between -90 and 90",
        ));
    }
    Ok(value)
}

fn check_longitude<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !(-180.0..=180.0).contains(&value) {
        return Err(serde::de::Error::custom(
            "longitude must be between -180 and 180",
        ));
    }
    Ok(value)
}

fn check_position<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Vec::<f64>::deserialize(deserializer)?;
    if value.len() < 2 {
        return Err(serde::de::Error::custom(
            "position must carry [latitude, longitude]",
        ));
    }
    Ok(value)
}

/// Authentication tokens from the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(default, alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default, alias = "isOtpCodeRequired")]
    pub is_otp_required: bool,
}

/// Hardware capabilities and limits of a watch generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub generation: String,
    #[serde(default = "default_device_type", rename = "type")]
    pub device_type: String,
    #[serde(alias = "firmwareVersion")]
    pub firmware_version: String,
    #[serde(default = "default_max_message_length", alias = "maxChatMessageLength")]
    pub max_chat_message_length: usize,
    #[serde(default = "default_max_phonebook", alias = "maxPhonebookEntries")]
    pub max_phonebook_entries: u32,
    #[serde(default = "default_max_geofences", alias = "maxGeofences")]
    pub max_geofences: u32,
    #[serde(default = "default_true", alias = "hasTextChat")]
    pub has_text_chat: bool,
    #[serde(default = "default_true", alias = "hasVoiceChat")]
    pub has_voice_chat: bool,
    #[serde(default = "default_true", alias = "hasEmojis")]
    pub has_emojis: bool,
    #[serde(default = "default_true", alias = "hasStepCounter")]
    pub has_step_counter: bool,
    #[serde(default = "default_true", alias = "hasLocatingSwitch")]
    pub has_locating_switch: bool,
}

fn default_device_type() -> String {
    "WATCH".to_string()
}

fn default_max_message_length() -> usize {
    95
}

fn default_max_phonebook() -> u32 {
    20
}

fn default_max_geofences() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// User-configurable settings of a watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub name: String,
    #[serde(alias = "hexColor")]
    pub hex_color: String,
    #[serde(default, alias = "phoneNr")]
    pub phone_nr: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default = "default_step_target", alias = "stepTarget")]
    pub step_target: u32,
    #[serde(default, deserialize_with = "non_negative", alias = "stepCount")]
    pub step_count: u32,
    #[serde(default, deserialize_with = "clamp_percent")]
    pub battery: u8,
    #[serde(default = "default_true", alias = "isLocatingActive")]
    pub is_locating_active: bool,
    #[serde(default = "default_ring_profile", alias = "ringProfile")]
    pub ring_profile: String,
}

fn default_step_target() -> u32 {
    10_000
}

fn default_ring_profile() -> String {
    "RING_AND_VIBRATE".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

/// Account that owns a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// A registered watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub imei: String,
    pub config: DeviceConfig,
    pub settings: DeviceSettings,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

/// Chat message direction/kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Text,
    Emoji,
    Voice,
}

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    App,
    Watch,
    Device,
}

impl Sender {
    /// True when the message originated on the watch side
    pub fn is_from_watch(self) -> bool {
        matches!(self, Sender::Watch | Sender::Device)
    }
}

/// A chat message between app and watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(alias = "deviceId")]
    pub device_id: String,
    pub text: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender: Sender,
    #[serde(default, alias = "isReceived")]
    pub is_received: bool,
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A named circular region used for presence detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "check_latitude", alias = "lat")]
    pub latitude: f64,
    #[serde(deserialize_with = "check_longitude", alias = "lng")]
    pub longitude: f64,
    /// Radius in meters
    pub radius: u32,
}

/// Location entry from `/v1/location/{deviceId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLocation {
    /// `[latitude, longitude]`
    #[serde(deserialize_with = "check_position")]
    pub position: Vec<f64>,
    #[serde(alias = "batteryLevel")]
    pub battery_level: i64,
    #[serde(alias = "signalStrength")]
    pub signal_strength: i64,
    #[serde(alias = "positionDeterminedBy")]
    pub position_determined_by: String,
    pub date: DateTime<Utc>,
    #[serde(alias = "lastResponse")]
    pub last_response: DateTime<Utc>,
    #[serde(default)]
    pub speed: i64,
    #[serde(default)]
    pub direction: i64,
    #[serde(alias = "deviceId")]
    pub device_id: String,
}

impl DeviceLocation {
    /// Latitude from the position array
    pub fn latitude(&self) -> f64 {
        self.position[0]
    }

    /// Longitude from the position array
    pub fn longitude(&self) -> f64 {
        self.position[1]
    }
}

/// A resolved device position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInfo {
    #[serde(deserialize_with = "check_latitude", alias = "lat")]
    pub latitude: f64,
    #[serde(deserialize_with = "check_longitude", alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// An item from the activity feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    #[serde(alias = "deviceId")]
    pub device_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// A wake-up alarm configured on a watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmClock {
    pub id: String,
    #[serde(alias = "deviceId")]
    pub device_id: String,
    /// "HH:MM"
    pub time: String,
    pub days: Vec<String>,
    pub enabled: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// A school-hours style do-not-disturb window on a watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceTime {
    pub id: String,
    #[serde(alias = "deviceId")]
    pub device_id: String,
    #[serde(alias = "startTime")]
    pub start_time: String,
    #[serde(alias = "endTime")]
    pub end_time: String,
    pub days: Vec<String>,
    pub enabled: bool,
}

/// Partial settings update sent to `/v1/device/{id}/settings`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_locating_active: Option<bool>,
}

impl SettingsPatch {
    pub fn ring_profile(profile: impl Into<String>) -> Self {
        Self {
            ring_profile: Some(profile.into()),
            ..Self::default()
        }
    }
}

/// Combined per-device snapshot, rebuilt wholesale on every poll cycle
#[derive(Debug, Clone, Serialize)]
pub struct AnioDeviceState {
    pub device: Device,
    pub location: Option<LocationInfo>,
    pub geofences: Vec<Geofence>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub battery_level: i64,
    pub signal_strength: i64,
    pub last_message: Option<ChatMessage>,
    pub alarms: Vec<AlarmClock>,
    pub silence_times: Vec<SilenceTime>,
    pub tracking_mode: Option<String>,
}

impl AnioDeviceState {
    /// Display name from the device settings
    pub fn name(&self) -> &str {
        &self.device.settings.name
    }
}
