//! Messaging Configuration
//!
//! System-wide provider credentials and endpoints. Loaded from environment
//! variables with the `RECALL_` prefix.

use recall_core::{CREDENTIAL_CACHE_TTL_SECS, DEFAULT_PROVIDER_TIMEOUT_SECS};
use std::env;
use std::time::Duration;

pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";

/// Platform-owned Twilio account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
}

/// Platform-owned SendGrid account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSendGridConfig {
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
}

/// Messaging configuration
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// `None` when the platform has no Twilio account wired up
    pub system_twilio: Option<SystemTwilioConfig>,
    /// `None` when the platform has no SendGrid account wired up
    pub system_sendgrid: Option<SystemSendGridConfig>,
    pub twilio_base_url: String,
    pub sendgrid_base_url: String,
    /// Public web app URL, used for unsubscribe links
    pub app_url: String,
    /// Public API URL, used for delivery webhooks
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: i64,
    /// 64 hex chars, or any passphrase (hashed to a key)
    pub encryption_key: Option<String>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            system_twilio: None,
            system_sendgrid: None,
            twilio_base_url: DEFAULT_TWILIO_BASE_URL.to_string(),
            sendgrid_base_url: DEFAULT_SENDGRID_BASE_URL.to_string(),
            app_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:8080".to_string(),
            request_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            cache_ttl_secs: CREDENTIAL_CACHE_TTL_SECS,
            encryption_key: None,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl MessagingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let system_twilio = match (
            non_empty("RECALL_TWILIO_ACCOUNT_SID"),
            non_empty("RECALL_TWILIO_AUTH_TOKEN"),
            non_empty("RECALL_TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(phone_number)) => Some(SystemTwilioConfig {
                account_sid,
                auth_token,
                phone_number,
            }),
            _ => None,
        };

        let system_sendgrid = match (
            non_empty("RECALL_SENDGRID_API_KEY"),
            non_empty("RECALL_SENDGRID_FROM_EMAIL"),
        ) {
            (Some(api_key), Some(from_email)) => Some(SystemSendGridConfig {
                api_key,
                from_email,
                from_name: non_empty("RECALL_SENDGRID_FROM_NAME")
                    .unwrap_or_else(|| "Benefit Reminders".to_string()),
            }),
            _ => None,
        };

        Self {
            system_twilio,
            system_sendgrid,
            twilio_base_url: non_empty("RECALL_TWILIO_BASE_URL").unwrap_or(defaults.twilio_base_url),
            sendgrid_base_url: non_empty("RECALL_SENDGRID_BASE_URL")
                .unwrap_or(defaults.sendgrid_base_url),
            app_url: non_empty("RECALL_APP_URL").unwrap_or(defaults.app_url),
            api_url: non_empty("RECALL_API_URL").unwrap_or(defaults.api_url),
            request_timeout_secs: non_empty("RECALL_PROVIDER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            cache_ttl_secs: non_empty("RECALL_CREDENTIAL_CACHE_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
            encryption_key: non_empty("RECALL_CREDENTIAL_ENCRYPTION_KEY"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_system_twilio(mut self, sid: &str, token: &str, phone: &str) -> Self {
        self.system_twilio = Some(SystemTwilioConfig {
            account_sid: sid.to_string(),
            auth_token: token.to_string(),
            phone_number: phone.to_string(),
        });
        self
    }

    pub fn with_system_sendgrid(mut self, api_key: &str, from_email: &str, from_name: &str) -> Self {
        self.system_sendgrid = Some(SystemSendGridConfig {
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        });
        self
    }

    pub fn with_encryption_key(mut self, key: &str) -> Self {
        self.encryption_key = Some(key.to_string());
        self
    }

    /// Unsubscribe link embedded in every email
    pub fn unsubscribe_url(&self, tenant_id: &str, patient_id: &str, channel: &str) -> String {
        format!(
            "{}/unsubscribe?tenant={}&patient={}&channel={}",
            self.app_url.trim_end_matches('/'),
            tenant_id,
            patient_id,
            channel
        )
    }

    /// Delivery-status webhook attached to SMS sends
    pub fn sms_status_callback_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/webhooks/twilio/status?tenant={}",
            self.api_url.trim_end_matches('/'),
            tenant_id
        )
    }

    /// Event webhook target for SendGrid open/click tracking
    pub fn email_events_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/webhooks/sendgrid/events?tenant={}",
            self.api_url.trim_end_matches('/'),
            tenant_id
        )
    }
}
