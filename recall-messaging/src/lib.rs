//! Recall Messaging - Provider Resolution and Delivery
//!
//! Resolves each tenant's SMS and email provider (custom Twilio / SendGrid
//! credentials or the platform's system accounts), caches the resulting
//! clients, and sends messages through them.
//!
//! # Architecture
//!
//! - `CredentialResolver`: tenant config -> provider client, with TTL cache
//!   and explicit invalidation
//! - `ClientFactory`: builds fresh per-tenant clients from explicit credentials
//! - `MessageDispatcher`: one message in, one `SendResult` out
//! - `CredentialCipher`: at-rest encryption of tenant provider secrets

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod provider;
pub mod resolver;
pub mod sender;

pub use cache::ClientCache;
pub use config::{MessagingConfig, SystemSendGridConfig, SystemTwilioConfig};
pub use crypto::{mask_secret, CredentialCipher};
pub use error::{MessagingError, MessagingResult};
pub use factory::{ClientFactory, HttpClientFactory};
pub use provider::{
    EmailClient, EmailMessage, MockClientFactory, MockEmailClient, MockSmsClient,
    SendGridCredentials, SmsClient, SmsMessage, TwilioCredentials,
};
pub use resolver::{ChannelClient, ChannelConfig, CredentialResolver, Resolved, ResolvedChannel};
pub use sender::{MessageDispatcher, SendMetadata};
