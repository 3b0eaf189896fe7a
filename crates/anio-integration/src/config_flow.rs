//! Login flow for adding or re-authenticating an ANIO account
//!
//! Mirrors the host flow contract: every step ends in a form (possibly with
//! errors), a created entry, or an abort.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use anio_api::{AnioApiError, AnioAuth, API_URL};
use anio_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntrySource, EntryData};
use anio_core::DOMAIN;

/// Steps a flow can ask the user to fill in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    /// Email and password
    User,
    /// One-time 2FA code
    Otp,
    /// Password for an existing account
    ReauthConfirm,
}

/// Outcome of a flow step
#[derive(Debug)]
pub enum FlowResult {
    /// Show a form, optionally with field errors keyed by "base"
    Form {
        step: FlowStep,
        errors: HashMap<String, String>,
    },
    /// A new entry was created
    CreateEntry { entry_id: String },
    /// The flow ended without creating an entry
    Abort { reason: String },
}

impl FlowResult {
    fn form(step: FlowStep) -> Self {
        FlowResult::Form {
            step,
            errors: HashMap::new(),
        }
    }

    fn form_with_error(step: FlowStep, code: &str) -> Self {
        FlowResult::Form {
            step,
            errors: HashMap::from([("base".to_string(), code.to_string())]),
        }
    }

    fn abort(reason: &str) -> Self {
        FlowResult::Abort {
            reason: reason.to_string(),
        }
    }
}

/// Handles the login / 2FA / re-authentication flow
pub struct AnioConfigFlow {
    entries: Arc<ConfigEntries>,
    http: reqwest::Client,
    base_url: String,
    email: Option<String>,
    auth: Option<Arc<AnioAuth>>,
    reauth_entry_id: Option<String>,
}

impl AnioConfigFlow {
    pub fn new(entries: Arc<ConfigEntries>, http: reqwest::Client) -> Self {
        Self {
            entries,
            http,
            base_url: API_URL.to_string(),
            email: None,
            auth: None,
            reauth_entry_id: None,
        }
    }

    /// Point the flow at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Initial step: log in with email and password
    pub async fn step_user(&mut self, email: &str, password: &str) -> FlowResult {
        let unique_id = email.to_lowercase();
        if self.entries.get_by_unique_id(DOMAIN, &unique_id).is_some() {
            return FlowResult::abort("already_configured");
        }

        self.email = Some(email.to_string());
        let auth = Arc::new(
            AnioAuth::new(self.http.clone())
                .with_base_url(&self.base_url)
                .with_credentials(email, password),
        );
        self.auth = Some(auth.clone());

        match auth.login(None).await {
            Ok(_) => self.finish().await,
            Err(AnioApiError::OtpRequired) => FlowResult::form(FlowStep::Otp),
            Err(err @ AnioApiError::Auth(_)) => {
                error!(error = %err, "authentication failed");
                FlowResult::form_with_error(FlowStep::User, "invalid_auth")
            }
            Err(err @ AnioApiError::Connection(_)) => {
                error!(error = %err, "connection failed");
                FlowResult::form_with_error(FlowStep::User, "cannot_connect")
            }
            Err(err) => {
                error!(error = %err, "unexpected error during login");
                FlowResult::form_with_error(FlowStep::User, "unknown")
            }
        }
    }

    /// 2FA step: retry the login with a one-time code
    pub async fn step_otp(&mut self, otp_code: &str) -> FlowResult {
        let Some(auth) = self.auth.clone() else {
            return FlowResult::abort("auth_error");
        };

        match auth.login(Some(otp_code)).await {
            Ok(_) => self.finish().await,
            Err(err @ (AnioApiError::Auth(_) | AnioApiError::OtpRequired)) => {
                error!(error = %err, "2FA authentication failed");
                FlowResult::form_with_error(FlowStep::Otp, "invalid_otp")
            }
            Err(err @ AnioApiError::Connection(_)) => {
                error!(error = %err, "connection failed");
                FlowResult::form_with_error(FlowStep::Otp, "cannot_connect")
            }
            Err(err) => {
                error!(error = %err, "unexpected error during 2FA login");
                FlowResult::form_with_error(FlowStep::Otp, "unknown")
            }
        }
    }

    /// Start re-authentication for an existing entry
    pub fn step_reauth(&mut self, entry_id: &str) -> FlowResult {
        let Some(entry) = self.entries.get(entry_id) else {
            return FlowResult::abort("unknown_entry");
        };

        self.email = Some(entry.data.email.clone());
        self.reauth_entry_id = Some(entry_id.to_string());
        FlowResult::form(FlowStep::ReauthConfirm)
    }

    /// Re-authentication: log in again with a fresh password
    pub async fn step_reauth_confirm(&mut self, password: &str) -> FlowResult {
        let Some(email) = self.email.clone() else {
            return FlowResult::abort("auth_error");
        };

        let auth = Arc::new(
            AnioAuth::new(self.http.clone())
                .with_base_url(&self.base_url)
                .with_credentials(&email, password),
        );
        self.auth = Some(auth.clone());

        match auth.login(None).await {
            Ok(_) => self.finish().await,
            Err(AnioApiError::OtpRequired) => FlowResult::form(FlowStep::Otp),
            Err(err @ AnioApiError::Auth(_)) => {
                error!(error = %err, "re-authentication failed");
                FlowResult::form_with_error(FlowStep::ReauthConfirm, "invalid_auth")
            }
            Err(err @ AnioApiError::Connection(_)) => {
                FlowResult::form_with_error(FlowStep::ReauthConfirm, "cannot_connect")
            }
            Err(err) => {
                error!(error = %err, "unexpected error during re-authentication");
                FlowResult::form_with_error(FlowStep::ReauthConfirm, "unknown")
            }
        }
    }

    /// Create the entry, or update the existing one on reauth
    async fn finish(&mut self) -> FlowResult {
        let (Some(email), Some(auth)) = (self.email.clone(), self.auth.clone()) else {
            return FlowResult::abort("auth_error");
        };

        let data = EntryData {
            email: email.clone(),
            access_token: auth.access_token().await,
            refresh_token: auth.refresh_token().await,
            app_uuid: Some(auth.app_uuid().to_string()),
        };

        if let Some(entry_id) = self.reauth_entry_id.clone() {
            let result = self
                .entries
                .update_entry(&entry_id, |entry| {
                    entry.data = data;
                    entry.source = ConfigEntrySource::Reauth;
                })
                .await;
            return match result {
                Ok(()) => FlowResult::abort("reauth_successful"),
                Err(err) => {
                    warn!(error = %err, "failed to update entry after reauth");
                    FlowResult::abort("unknown_entry")
                }
            };
        }

        let entry = ConfigEntry::new(&email, data).with_unique_id(email.to_lowercase());
        match self.entries.add(entry).await {
            Ok(entry_id) => FlowResult::CreateEntry { entry_id },
            Err(ConfigEntriesError::AlreadyExists { .. }) => {
                FlowResult::abort("already_configured")
            }
            Err(err) => {
                error!(error = %err, "failed to store config entry");
                FlowResult::abort("storage_error")
            }
        }
    }
}
