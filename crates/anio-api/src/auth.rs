//! Authentication against the ANIO Cloud API
//!
//! Tracks JWT expiry locally (the payload's `exp` claim, decoded without
//! verification) and refreshes the access token through
//! `/v1/auth/refresh-access-token` when it is about to expire. A rotated
//! refresh token in the response replaces the stored one, and a caller
//! supplied callback persists both values.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AnioApiError, ApiResult};
use crate::models::AuthTokens;
use crate::{API_URL, CLIENT_ID, TOKEN_REFRESH_BUFFER_SECS};

/// Invoked with (access_token, refresh_token) after every successful refresh
pub type TokenRefreshCallback =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
}

/// Handles login, token refresh and token storage
pub struct AnioAuth {
    http: reqwest::Client,
    base_url: String,
    email: Option<String>,
    password: Option<String>,
    app_uuid: String,
    state: Mutex<TokenState>,
    on_token_refresh: Option<TokenRefreshCallback>,
}

impl AnioAuth {
    /// Create an auth handler with no credentials or tokens yet
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: API_URL.to_string(),
            email: None,
            password: None,
            app_uuid: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(TokenState::default()),
            on_token_refresh: None,
        }
    }

    /// Point the handler at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set login credentials
    pub fn with_credentials(
        mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self
    }

    /// Seed existing tokens, parsing the access token's expiry
    pub fn with_tokens(
        mut self,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        let token_expiry = access_token.as_deref().and_then(parse_jwt_expiry);
        *self.state.get_mut() = TokenState {
            access_token,
            refresh_token,
            token_expiry,
        };
        self
    }

    /// Use a fixed app UUID instead of a generated one
    pub fn with_app_uuid(mut self, app_uuid: impl Into<String>) -> Self {
        self.app_uuid = app_uuid.into();
        self
    }

    /// Register the token persistence callback
    pub fn with_refresh_callback(mut self, callback: TokenRefreshCallback) -> Self {
        self.on_token_refresh = Some(callback);
        self
    }

    /// The app UUID sent with every request
    pub fn app_uuid(&self) -> &str {
        &self.app_uuid
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access_token.clone()
    }

    /// Current refresh token, if any
    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.refresh_token.clone()
    }

    /// True while the access token exists and won't expire within the buffer
    pub async fn is_token_valid(&self) -> bool {
        let state = self.state.lock().await;
        match (&state.access_token, state.token_expiry) {
            (Some(_), Some(expiry)) => {
                Utc::now() < expiry - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS)
            }
            _ => false,
        }
    }

    /// Authenticate with email and password
    ///
    /// Pass the OTP code on the second attempt when the account has 2FA
    /// enabled; without it an OTP-flagged response raises `OtpRequired`.
    pub async fn login(&self, otp_code: Option<&str>) -> ApiResult<AuthTokens> {
        let (Some(email), Some(password)) = (&self.email, &self.password) else {
            return Err(AnioApiError::Auth(
                "email and password are required for login".to_string(),
            ));
        };

        let mut payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(code) = otp_code {
            payload["otpCode"] = serde_json::json!(code);
        }

        let response = self
            .http
            .post(format!("{}/v1/auth/login", self.base_url))
            .header("client-id", CLIENT_ID)
            .header("app-uuid", &self.app_uuid)
            .json(&payload)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AnioApiError::Auth("invalid email or password".to_string()));
        }
        if response.status() != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(AnioApiError::Auth(format!("login failed: {text}")));
        }

        let tokens: AuthTokens = response.json().await?;

        if tokens.is_otp_required && otp_code.is_none() {
            return Err(AnioApiError::OtpRequired);
        }

        let expiry = parse_jwt_expiry(&tokens.access_token);
        {
            let mut state = self.state.lock().await;
            state.access_token = Some(tokens.access_token.clone());
            state.refresh_token = Some(tokens.refresh_token.clone());
            state.token_expiry = expiry;
        }
        debug!(expiry = ?expiry, "login successful");

        Ok(tokens)
    }

    /// Refresh the access token, rotating the refresh token if the server
    /// returned a new one, and returning the new access token
    pub async fn refresh(&self) -> ApiResult<String> {
        let refresh_token = self
            .state
            .lock()
            .await
            .refresh_token
            .clone()
            .ok_or_else(|| AnioApiError::Auth("no refresh token available".to_string()))?;

        let response = self
            .http
            .post(format!("{}/v1/auth/refresh-access-token", self.base_url))
            .bearer_auth(&refresh_token)
            .header("client-id", CLIENT_ID)
            .header("app-uuid", &self.app_uuid)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AnioApiError::Auth("refresh token expired".to_string()));
        }
        if response.status() != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(AnioApiError::Auth(format!("token refresh failed: {text}")));
        }

        let body: serde_json::Value = response.json().await?;
        let access_token = body
            .get("accessToken")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AnioApiError::Auth("refresh response carried no access token".to_string())
            })?
            .to_string();
        let rotated_refresh = body
            .get("refreshToken")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let expiry = parse_jwt_expiry(&access_token);
        let persisted_refresh = {
            let mut state = self.state.lock().await;
            state.access_token = Some(access_token.clone());
            state.token_expiry = expiry;
            if let Some(rotated) = rotated_refresh {
                state.refresh_token = Some(rotated);
            }
            state.refresh_token.clone().unwrap_or_default()
        };
        debug!(expiry = ?expiry, "token refreshed");

        if let Some(callback) = &self.on_token_refresh {
            callback(access_token.clone(), persisted_refresh).await;
        }

        Ok(access_token)
    }

    /// Return a valid access token, refreshing first when needed
    pub async fn ensure_valid_token(&self) -> ApiResult<String> {
        if self.is_token_valid().await {
            if let Some(token) = self.access_token().await {
                return Ok(token);
            }
        }

        debug!("token expired or expiring soon, refreshing");
        self.refresh().await
    }

    /// Best-effort logout; always clears local token state
    pub async fn logout(&self) {
        let access_token = self.access_token().await;

        if let Some(token) = access_token {
            let result = self
                .http
                .post(format!("{}/v1/auth/logout", self.base_url))
                .bearer_auth(&token)
                .send()
                .await;
            if let Err(err) = result {
                warn!(error = %err, "logout request failed");
            }
        }

        *self.state.lock().await = TokenState::default();
    }
}

/// Decode the `exp` claim from a JWT payload, without verifying the signature
fn parse_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = payload.get("exp")?.as_i64()?;

    DateTime::from_timestamp(exp, 0)
}
