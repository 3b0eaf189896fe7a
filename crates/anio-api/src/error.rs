//! Error taxonomy for the ANIO Cloud API

use thiserror::Error;

/// Errors returned by the API client and auth handler
#[derive(Debug, Error)]
pub enum AnioApiError {
    /// Authentication failed: bad credentials, 401, or expired refresh token
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The account requires a 2FA one-time code to complete login
    #[error("OTP code required")]
    OtpRequired,

    /// Rate limited past the retry ceiling
    #[error("rate limit exceeded")]
    RateLimit {
        /// Seconds the server asked us to wait, if it said
        retry_after: Option<u64>,
    },

    /// The requested resource does not exist (HTTP 404)
    ///
    /// Callers may reinterpret this as an empty result, e.g. the geofence
    /// list endpoint 404s when no geofences exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other 4xx/5xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure
    #[error("connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("unexpected response payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Message text exceeds the device's chat message limit
    #[error("message too long: {length} characters (max {max_length})")]
    MessageTooLong { length: usize, max_length: usize },

    /// Emoji code outside the E01..E12 range
    #[error("invalid emoji code: {0} (valid codes are E01..E12)")]
    InvalidEmoji(String),
}

impl AnioApiError {
    /// True for errors that should trigger a re-authentication flow
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AnioApiError::Auth(_) | AnioApiError::OtpRequired)
    }

    /// True for errors expected to clear on their own by the next poll
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnioApiError::RateLimit { .. } | AnioApiError::Connection(_)
        )
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, AnioApiError>;
