//! Provider clients
//!
//! Every tenant gets its own independently configured client instance; no
//! provider SDK state is shared or mutated across tenants.

mod mock;
mod sendgrid;
mod twilio;

pub use mock::{MockClientFactory, MockEmailClient, MockSmsClient};
pub use sendgrid::SendGridEmailClient;
pub use twilio::TwilioSmsClient;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::mask_secret;
use crate::error::MessagingResult;

/// An SMS ready to transmit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
    /// Delivery-status webhook
    pub status_callback: Option<String>,
}

/// An email ready to transmit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub unsubscribe_url: Option<String>,
    /// Enable open and click tracking
    pub tracking: bool,
    /// Echoed back on provider webhooks for correlation
    pub custom_args: BTreeMap<String, String>,
}

/// SMS transmission client
#[async_trait]
pub trait SmsClient: Send + Sync {
    /// Send one SMS, returning the provider message id
    async fn send_sms(&self, message: &SmsMessage) -> MessagingResult<String>;

    /// Sender phone number
    fn from_number(&self) -> &str;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Email transmission client
#[async_trait]
pub trait EmailClient: Send + Sync {
    /// Send one email, returning the provider message id when one came back
    async fn send_email(&self, message: &EmailMessage) -> MessagingResult<Option<String>>;

    /// Sender address
    fn from_email(&self) -> &str;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Decrypted Twilio credentials
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: Zeroizing<String>,
    pub phone_number: String,
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// Decrypted SendGrid credentials
#[derive(Clone)]
pub struct SendGridCredentials {
    pub api_key: Zeroizing<String>,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl fmt::Debug for SendGridCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridCredentials")
            .field("api_key", &mask_secret(&self.api_key))
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .finish()
    }
}
