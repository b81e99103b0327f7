//! Tenant (practice) configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::TenantId;

/// Email provider requested by the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailProviderSetting {
    #[default]
    System,
    CustomSendgrid,
}

/// SMS provider requested by the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsProviderSetting {
    #[default]
    System,
    CustomTwilio,
}

/// Per-tenant messaging configuration
///
/// Secrets are stored encrypted (`*_encrypted`) and only decrypted by the
/// credential resolver when a custom client is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingSettings {
    pub email_provider: EmailProviderSetting,
    pub sendgrid_api_key_encrypted: Option<String>,
    pub sendgrid_from_email: Option<String>,
    pub sendgrid_from_name: Option<String>,
    /// Sending domain verified with SendGrid
    pub email_domain_verified: bool,
    pub email_fallback_to_system: bool,

    pub sms_provider: SmsProviderSetting,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token_encrypted: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub sms_fallback_to_system: bool,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            email_provider: EmailProviderSetting::System,
            sendgrid_api_key_encrypted: None,
            sendgrid_from_email: None,
            sendgrid_from_name: None,
            email_domain_verified: false,
            email_fallback_to_system: true,
            sms_provider: SmsProviderSetting::System,
            twilio_account_sid: None,
            twilio_auth_token_encrypted: None,
            twilio_phone_number: None,
            sms_fallback_to_system: true,
        }
    }
}

/// Subscription usage counters consulted before every send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub messages_sent_this_period: u32,
    /// `None` means unlimited
    pub monthly_message_limit: Option<u32>,
    pub period_started_at: DateTime<Utc>,
}

impl UsageCounters {
    pub fn unlimited(period_started_at: DateTime<Utc>) -> Self {
        Self {
            messages_sent_this_period: 0,
            monthly_message_limit: None,
            period_started_at,
        }
    }

    /// Whether one more message fits in the current period
    pub fn has_capacity(&self) -> bool {
        match self.monthly_message_limit {
            Some(limit) => self.messages_sent_this_period < limit,
            None => true,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.monthly_message_limit
            .map(|limit| limit.saturating_sub(self.messages_sent_this_period))
    }
}

/// Practice account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub is_active: bool,
    pub messaging: MessagingSettings,
    pub usage: UsageCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create an active tenant on system providers with unlimited usage
    pub fn new(tenant_id: TenantId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            is_active: true,
            messaging: MessagingSettings::default(),
            usage: UsageCounters::unlimited(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_messaging(mut self, messaging: MessagingSettings) -> Self {
        self.messaging = messaging;
        self
    }

    pub fn with_message_limit(mut self, limit: u32) -> Self {
        self.usage.monthly_message_limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_capacity() {
        let mut usage = UsageCounters::unlimited(Utc::now());
        assert!(usage.has_capacity());
        assert_eq!(usage.remaining(), None);

        usage.monthly_message_limit = Some(2);
        usage.messages_sent_this_period = 1;
        assert!(usage.has_capacity());
        assert_eq!(usage.remaining(), Some(1));

        usage.messages_sent_this_period = 2;
        assert!(!usage.has_capacity());
        assert_eq!(usage.remaining(), Some(0));
    }

    #[test]
    fn test_default_settings_fall_back() {
        let settings = MessagingSettings::default();
        assert_eq!(settings.email_provider, EmailProviderSetting::System);
        assert!(settings.email_fallback_to_system);
        assert!(settings.sms_fallback_to_system);
    }
}
