//! Client factory
//!
//! Builds a fresh provider client from explicit credentials. The resolver
//! never mutates a shared client to switch accounts.

use recall_core::MessagingProvider;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MessagingConfig;
use crate::error::MessagingResult;
use crate::provider::{
    EmailClient, SendGridCredentials, SendGridEmailClient, SmsClient, TwilioCredentials,
    TwilioSmsClient,
};

/// Constructs provider clients
pub trait ClientFactory: Send + Sync {
    fn sms_client(
        &self,
        credentials: TwilioCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn SmsClient>>;

    fn email_client(
        &self,
        credentials: SendGridCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn EmailClient>>;
}

/// Factory for the real HTTP clients
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    twilio_base_url: String,
    sendgrid_base_url: String,
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn from_config(config: &MessagingConfig) -> Self {
        Self {
            twilio_base_url: config.twilio_base_url.clone(),
            sendgrid_base_url: config.sendgrid_base_url.clone(),
            timeout: config.request_timeout(),
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn sms_client(
        &self,
        credentials: TwilioCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn SmsClient>> {
        let client =
            TwilioSmsClient::new(credentials, &self.twilio_base_url, self.timeout, provider)?;
        Ok(Arc::new(client))
    }

    fn email_client(
        &self,
        credentials: SendGridCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn EmailClient>> {
        let client =
            SendGridEmailClient::new(credentials, &self.sendgrid_base_url, self.timeout, provider)?;
        Ok(Arc::new(client))
    }
}
