//! Client for the ANIO Cloud API
//!
//! Provides the authentication handler (JWT-expiry tracking, token refresh
//! with rotation), the REST client with shared rate-limit handling, and the
//! typed response models.

mod auth;
mod client;
mod error;
mod models;

pub use auth::{AnioAuth, TokenRefreshCallback};
pub use client::AnioApiClient;
pub use error::{AnioApiError, ApiResult};
pub use models::{
    ActivityItem, AlarmClock, AnioDeviceState, AuthTokens, ChatMessage, Device, DeviceConfig,
    DeviceLocation, DeviceSettings, Gender, Geofence, LocationInfo, MessageType, Sender,
    SettingsPatch, SilenceTime, UserInfo,
};

/// Production API endpoint
pub const API_URL: &str = "https://api.anio.cloud";

/// Value of the `client-id` header sent on auth requests
pub const CLIENT_ID: &str = "anio";

/// Refresh this many seconds before the token actually expires
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Give up after this many consecutive 429 responses
pub const RATE_LIMIT_MAX_RETRIES: u32 = 5;

/// Exponential backoff base (seconds) when no Retry-After header is present
pub const RATE_LIMIT_BACKOFF_BASE: u64 = 2;

/// Chat message length limit used when the device config doesn't say
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 95;

/// Check an emoji code against the supported E01..E12 range
pub fn is_valid_emoji_code(code: &str) -> bool {
    code.len() == 3
        && code.starts_with('E')
        && matches!(code[1..].parse::<u8>(), Ok(n) if (1..=12).contains(&n))
}
