//! Identifiers and channel enums shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Practice account - the multi-tenancy boundary
    TenantId
);
string_id!(
    /// Patient identifier
    PatientId
);
string_id!(
    /// Campaign identifier
    CampaignId
);
string_id!(
    /// Sequence step identifier
    StepId
);
string_id!(
    /// Outreach log row identifier
    LogId
);
string_id!(
    /// Sequence state row identifier
    SequenceStateId
);

/// Transmission channel of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel selection configured on a campaign or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Sms,
    Email,
    Both,
}

impl MessageType {
    /// Channels to attempt, SMS first
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            MessageType::Sms => vec![Channel::Sms],
            MessageType::Email => vec![Channel::Email],
            MessageType::Both => vec![Channel::Sms, Channel::Email],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Sms => "sms",
            MessageType::Email => "email",
            MessageType::Both => "both",
        }
    }
}

impl From<Channel> for MessageType {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Sms => MessageType::Sms,
            Channel::Email => MessageType::Email,
        }
    }
}

/// Credential source that transmitted a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingProvider {
    /// Platform-wide credentials from the environment
    System,
    /// Tenant-owned SendGrid account
    CustomSendgrid,
    /// Tenant-owned Twilio account
    CustomTwilio,
}

impl MessagingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagingProvider::System => "system",
            MessagingProvider::CustomSendgrid => "custom_sendgrid",
            MessagingProvider::CustomTwilio => "custom_twilio",
        }
    }

    pub fn is_custom(&self) -> bool {
        !matches!(self, MessagingProvider::System)
    }
}

impl fmt::Display for MessagingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
