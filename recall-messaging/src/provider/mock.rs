//! Mock provider clients for testing

use async_trait::async_trait;
use recall_core::MessagingProvider;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{
    EmailClient, EmailMessage, SendGridCredentials, SmsClient, SmsMessage, TwilioCredentials,
};
use crate::error::{MessagingError, MessagingResult};
use crate::factory::ClientFactory;

/// Behaviour knobs shared by both mock clients
#[derive(Default)]
struct MockBehaviour {
    fail_mode: AtomicBool,
    failing_recipients: RwLock<HashSet<String>>,
    delay: RwLock<Option<Duration>>,
    sequence: AtomicU64,
    omit_message_id: AtomicBool,
}

impl MockBehaviour {
    async fn check(&self, provider: MessagingProvider, recipient: &str) -> MessagingResult<u64> {
        let delay = *self.delay.read().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(MessagingError::provider(provider, "Mock failure mode"));
        }
        let rejected = self
            .failing_recipients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(recipient);
        if rejected {
            return Err(MessagingError::provider(
                provider,
                format!("Mock rejected recipient {}", recipient),
            ));
        }
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// In-memory SMS client
pub struct MockSmsClient {
    from_number: String,
    provider: MessagingProvider,
    sent: RwLock<Vec<SmsMessage>>,
    behaviour: MockBehaviour,
}

impl MockSmsClient {
    pub fn new(from_number: &str, provider: MessagingProvider) -> Self {
        Self {
            from_number: from_number.to_string(),
            provider,
            sent: RwLock::new(Vec::new()),
            behaviour: MockBehaviour::default(),
        }
    }

    /// Fail every send
    pub fn set_fail_mode(&self, fail: bool) {
        self.behaviour.fail_mode.store(fail, Ordering::SeqCst);
    }

    /// Fail sends to one number
    pub fn fail_recipient(&self, recipient: &str) {
        self.behaviour
            .failing_recipients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(recipient.to_string());
    }

    /// Sleep before answering
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.behaviour.delay.write().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SmsClient for MockSmsClient {
    async fn send_sms(&self, message: &SmsMessage) -> MessagingResult<String> {
        let n = self.behaviour.check(self.provider, &message.to).await?;
        self.sent
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(format!("SM{:032x}", n))
    }

    fn from_number(&self) -> &str {
        &self.from_number
    }

    fn name(&self) -> &'static str {
        "mock-twilio"
    }
}

/// In-memory email client
pub struct MockEmailClient {
    from_email: String,
    provider: MessagingProvider,
    sent: RwLock<Vec<EmailMessage>>,
    behaviour: MockBehaviour,
}

impl MockEmailClient {
    pub fn new(from_email: &str, provider: MessagingProvider) -> Self {
        Self {
            from_email: from_email.to_string(),
            provider,
            sent: RwLock::new(Vec::new()),
            behaviour: MockBehaviour::default(),
        }
    }

    pub fn set_fail_mode(&self, fail: bool) {
        self.behaviour.fail_mode.store(fail, Ordering::SeqCst);
    }

    pub fn fail_recipient(&self, recipient: &str) {
        self.behaviour
            .failing_recipients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(recipient.to_string());
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.behaviour.delay.write().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Accept sends without returning a message id
    pub fn set_omit_message_id(&self, omit: bool) {
        self.behaviour.omit_message_id.store(omit, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmailClient for MockEmailClient {
    async fn send_email(&self, message: &EmailMessage) -> MessagingResult<Option<String>> {
        let n = self.behaviour.check(self.provider, &message.to).await?;
        self.sent
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        if self.behaviour.omit_message_id.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(format!("sg_msg_{:08}", n)))
    }

    fn from_email(&self) -> &str {
        &self.from_email
    }

    fn name(&self) -> &'static str {
        "mock-sendgrid"
    }
}

/// Factory handing out mock clients, one per account
///
/// SMS mocks are keyed by account SID, email mocks by sender address, so a
/// test can fetch the exact client a tenant resolved to.
#[derive(Default)]
pub struct MockClientFactory {
    sms: RwLock<HashMap<String, Arc<MockSmsClient>>>,
    email: RwLock<HashMap<String, Arc<MockEmailClient>>>,
    fail_construction: AtomicBool,
    builds: AtomicU64,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every client construction fail
    pub fn set_fail_construction(&self, fail: bool) {
        self.fail_construction.store(fail, Ordering::SeqCst);
    }

    /// Number of clients built so far
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    /// Mock for a Twilio account, created on first use
    pub fn sms_mock(&self, account_sid: &str, from_number: &str, provider: MessagingProvider) -> Arc<MockSmsClient> {
        self.sms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(account_sid.to_string())
            .or_insert_with(|| Arc::new(MockSmsClient::new(from_number, provider)))
            .clone()
    }

    /// Mock for a SendGrid sender, created on first use
    pub fn email_mock(&self, from_email: &str, provider: MessagingProvider) -> Arc<MockEmailClient> {
        self.email
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(from_email.to_string())
            .or_insert_with(|| Arc::new(MockEmailClient::new(from_email, provider)))
            .clone()
    }
}

impl ClientFactory for MockClientFactory {
    fn sms_client(
        &self,
        credentials: TwilioCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn SmsClient>> {
        if self.fail_construction.load(Ordering::SeqCst) {
            return Err(MessagingError::configuration(provider, "Mock construction failure"));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.sms_mock(&credentials.account_sid, &credentials.phone_number, provider))
    }

    fn email_client(
        &self,
        credentials: SendGridCredentials,
        provider: MessagingProvider,
    ) -> MessagingResult<Arc<dyn EmailClient>> {
        if self.fail_construction.load(Ordering::SeqCst) {
            return Err(MessagingError::configuration(provider, "Mock construction failure"));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.email_mock(&credentials.from_email, provider))
    }
}
