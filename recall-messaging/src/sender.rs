//! Channel senders
//!
//! [`MessageDispatcher`] turns one rendered message into one provider call
//! and always returns a [`SendResult`]; it never returns an error. A tenant
//! with no provider configured anywhere gets a simulated success so outreach
//! bookkeeping keeps working in development.

use recall_core::{
    CampaignId, Channel, MessagingProvider, PatientId, SendResult, TenantId,
    SIMULATED_EMAIL_PREFIX, SIMULATED_SMS_PREFIX,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MessagingConfig;
use crate::error::MessagingError;
use crate::metrics::{self, SendOutcome};
use crate::provider::{EmailMessage, SmsMessage};
use crate::resolver::CredentialResolver;

/// Correlation data attached to a send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMetadata {
    pub patient_id: Option<PatientId>,
    pub campaign_id: Option<CampaignId>,
    pub step_number: Option<u32>,
}

fn simulated_id(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_body(text: &str, unsubscribe_url: Option<&str>) -> String {
    let mut html = format!("<p>{}</p>", escape_html(text).replace('\n', "<br>"));
    if let Some(url) = unsubscribe_url {
        html.push_str(&format!(
            "<p style=\"font-size:12px;color:#888\"><a href=\"{}\">Unsubscribe</a></p>",
            escape_html(url)
        ));
    }
    html
}

/// Sends SMS and email through whichever provider the tenant resolves to
pub struct MessageDispatcher {
    resolver: Arc<CredentialResolver>,
    config: Arc<MessagingConfig>,
}

impl MessageDispatcher {
    pub fn new(resolver: Arc<CredentialResolver>, config: Arc<MessagingConfig>) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &Arc<CredentialResolver> {
        &self.resolver
    }

    /// Send on either channel; `subject` is ignored for SMS
    pub async fn send(
        &self,
        channel: Channel,
        tenant_id: &TenantId,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &SendMetadata,
    ) -> SendResult {
        match channel {
            Channel::Sms => self.send_sms(tenant_id, recipient, body, metadata).await,
            Channel::Email => {
                self.send_email(tenant_id, recipient, subject, body, metadata)
                    .await
            }
        }
    }

    pub async fn send_sms(
        &self,
        tenant_id: &TenantId,
        recipient: &str,
        body: &str,
        metadata: &SendMetadata,
    ) -> SendResult {
        let resolved = match self.resolver.resolve_sms(tenant_id).await {
            Ok(resolved) => resolved,
            Err(e) => return self.resolution_failed(Channel::Sms, tenant_id, e),
        };
        let provider = resolved.config.provider;

        let Some(client) = resolved.client else {
            return self.simulate(Channel::Sms, tenant_id, SIMULATED_SMS_PREFIX);
        };

        let message = SmsMessage {
            to: recipient.to_string(),
            body: body.to_string(),
            status_callback: Some(self.config.sms_status_callback_url(tenant_id.as_str())),
        };

        let outcome = tokio::time::timeout(self.config.request_timeout(), async {
            client.send_sms(&message).await.map(Some)
        })
        .await;
        self.finish(Channel::Sms, tenant_id, provider, metadata, outcome)
    }

    pub async fn send_email(
        &self,
        tenant_id: &TenantId,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &SendMetadata,
    ) -> SendResult {
        let resolved = match self.resolver.resolve_email(tenant_id).await {
            Ok(resolved) => resolved,
            Err(e) => return self.resolution_failed(Channel::Email, tenant_id, e),
        };
        let provider = resolved.config.provider;

        let Some(client) = resolved.client else {
            return self.simulate(Channel::Email, tenant_id, SIMULATED_EMAIL_PREFIX);
        };

        let unsubscribe_url = metadata.patient_id.as_ref().map(|patient_id| {
            self.config
                .unsubscribe_url(tenant_id.as_str(), patient_id.as_str(), Channel::Email.as_str())
        });

        let mut custom_args = BTreeMap::new();
        custom_args.insert("tenant_id".to_string(), tenant_id.to_string());
        custom_args.insert("provider".to_string(), provider.as_str().to_string());
        if let Some(patient_id) = &metadata.patient_id {
            custom_args.insert("patient_id".to_string(), patient_id.to_string());
        }
        if let Some(campaign_id) = &metadata.campaign_id {
            custom_args.insert("campaign_id".to_string(), campaign_id.to_string());
        }
        if let Some(step_number) = metadata.step_number {
            custom_args.insert("step_number".to_string(), step_number.to_string());
        }

        let message = EmailMessage {
            to: recipient.to_string(),
            subject: subject.to_string(),
            text_body: body.to_string(),
            html_body: Some(html_body(body, unsubscribe_url.as_deref())),
            unsubscribe_url,
            tracking: true,
            custom_args,
        };

        let outcome =
            tokio::time::timeout(self.config.request_timeout(), client.send_email(&message)).await;
        self.finish(Channel::Email, tenant_id, provider, metadata, outcome)
    }

    fn resolution_failed(&self, channel: Channel, tenant_id: &TenantId, e: MessagingError) -> SendResult {
        let provider = e.attributed_provider().unwrap_or(MessagingProvider::System);
        warn!(
            tenant_id = %tenant_id,
            channel = %channel,
            provider = %provider,
            error = %e,
            "Messaging provider could not be resolved"
        );
        metrics::record_send(channel, provider, SendOutcome::Failed);
        SendResult::failed(e.to_string(), provider)
    }

    fn simulate(&self, channel: Channel, tenant_id: &TenantId, prefix: &str) -> SendResult {
        let message_id = simulated_id(prefix);
        info!(
            tenant_id = %tenant_id,
            channel = %channel,
            message_id = %message_id,
            "No provider configured, simulating send"
        );
        metrics::record_send(channel, MessagingProvider::System, SendOutcome::Simulated);
        SendResult::simulated(message_id)
    }

    fn finish(
        &self,
        channel: Channel,
        tenant_id: &TenantId,
        provider: MessagingProvider,
        metadata: &SendMetadata,
        outcome: Result<Result<Option<String>, MessagingError>, tokio::time::error::Elapsed>,
    ) -> SendResult {
        let error = match outcome {
            Ok(Ok(message_id)) => {
                debug!(
                    tenant_id = %tenant_id,
                    channel = %channel,
                    provider = %provider,
                    message_id = ?message_id,
                    "Message accepted"
                );
                metrics::record_send(channel, provider, SendOutcome::Sent);
                return SendResult::accepted(message_id, provider);
            }
            Ok(Err(e)) => e,
            Err(_) => MessagingError::Timeout(format!(
                "no response within {}s",
                self.config.request_timeout_secs
            )),
        };

        warn!(
            tenant_id = %tenant_id,
            patient_id = ?metadata.patient_id,
            channel = %channel,
            provider = %provider,
            error = %error,
            "Send failed"
        );
        metrics::record_send(channel, provider, SendOutcome::Failed);
        SendResult::failed(error.to_string(), provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ClientFactory;
    use crate::provider::MockClientFactory;
    use chrono::Utc;
    use recall_core::{ManualClock, Tenant};
    use recall_store::{InMemoryStore, TenantRepository};
    use std::time::Duration;

    const SYSTEM_SID: &str = "AC00000000000000000000000000000000";

    async fn dispatcher(
        config: MessagingConfig,
    ) -> (MessageDispatcher, Arc<MockClientFactory>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_tenant(Tenant::new(TenantId::new("tenant:1"), "Smile Dental", Utc::now()))
            .await;
        let factory = Arc::new(MockClientFactory::new());
        let config = Arc::new(config);
        let tenants: Arc<dyn TenantRepository> = store.clone();
        let client_factory: Arc<dyn ClientFactory> = factory.clone();
        let resolver = Arc::new(CredentialResolver::new(
            tenants,
            client_factory,
            config.clone(),
            Arc::new(ManualClock::new(Utc::now())),
        ));
        (MessageDispatcher::new(resolver, config), factory, store)
    }

    #[tokio::test]
    async fn test_no_provider_simulates_sms() {
        let (dispatcher, factory, _) = dispatcher(MessagingConfig::default()).await;
        let result = dispatcher
            .send_sms(&TenantId::new("tenant:1"), "+15555550100", "hi", &SendMetadata::default())
            .await;

        assert!(result.success);
        assert!(result.simulated);
        assert_eq!(result.provider, MessagingProvider::System);
        assert!(result.message_id.unwrap().starts_with("mock_sms_"));
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn test_no_provider_simulates_email() {
        let (dispatcher, _, _) = dispatcher(MessagingConfig::default()).await;
        let result = dispatcher
            .send_email(
                &TenantId::new("tenant:1"),
                "jane@example.com",
                "Benefits",
                "hi",
                &SendMetadata::default(),
            )
            .await;
        assert!(result.success);
        assert!(result.message_id.unwrap().starts_with("mock_email_"));
    }

    #[tokio::test]
    async fn test_system_sms_attaches_callback() {
        let config = MessagingConfig::default().with_system_twilio(
            SYSTEM_SID,
            "0123456789abcdef0123456789abcdef",
            "+15555550000",
        );
        let (dispatcher, factory, _) = dispatcher(config).await;
        let tenant = TenantId::new("tenant:1");

        let result = dispatcher
            .send_sms(&tenant, "+15555550100", "hi", &SendMetadata::default())
            .await;
        assert!(result.success);
        assert!(!result.simulated);
        assert_eq!(result.provider, MessagingProvider::System);

        let mock = factory.sms_mock(SYSTEM_SID, "+15555550000", MessagingProvider::System);
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0]
            .status_callback
            .as_deref()
            .unwrap()
            .ends_with("/webhooks/twilio/status?tenant=tenant:1"));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failed_result() {
        let config = MessagingConfig::default().with_system_twilio(
            SYSTEM_SID,
            "0123456789abcdef0123456789abcdef",
            "+15555550000",
        );
        let (dispatcher, factory, _) = dispatcher(config).await;
        factory
            .sms_mock(SYSTEM_SID, "+15555550000", MessagingProvider::System)
            .set_fail_mode(true);

        let result = dispatcher
            .send_sms(&TenantId::new("tenant:1"), "+15555550100", "hi", &SendMetadata::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Mock failure mode"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let mut config = MessagingConfig::default().with_system_sendgrid(
            "SG.system-key-0000000000",
            "noreply@recall.example.com",
            "Benefit Reminders",
        );
        config.request_timeout_secs = 1;
        let (dispatcher, factory, _) = dispatcher(config).await;
        factory
            .email_mock("noreply@recall.example.com", MessagingProvider::System)
            .set_delay(Some(Duration::from_secs(5)));

        let result = dispatcher
            .send_email(
                &TenantId::new("tenant:1"),
                "jane@example.com",
                "Benefits",
                "hi",
                &SendMetadata::default(),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_email_tracking_and_unsubscribe() {
        let config = MessagingConfig::default().with_system_sendgrid(
            "SG.system-key-0000000000",
            "noreply@recall.example.com",
            "Benefit Reminders",
        );
        let (dispatcher, factory, _) = dispatcher(config).await;
        let metadata = SendMetadata {
            patient_id: Some(PatientId::new("patient:7")),
            campaign_id: Some(CampaignId::new("campaign:3")),
            step_number: Some(2),
        };

        let result = dispatcher
            .send_email(&TenantId::new("tenant:1"), "jane@example.com", "Subj", "a < b", &metadata)
            .await;
        assert!(result.success);

        let sent = factory
            .email_mock("noreply@recall.example.com", MessagingProvider::System)
            .sent();
        let email = &sent[0];
        assert!(email.tracking);
        assert_eq!(email.custom_args["patient_id"], "patient:7");
        assert_eq!(email.custom_args["step_number"], "2");
        assert!(email
            .unsubscribe_url
            .as_deref()
            .unwrap()
            .contains("patient=patient:7&channel=email"));
        assert!(email.html_body.as_deref().unwrap().contains("a &lt; b"));
    }

    #[tokio::test]
    async fn test_email_without_provider_id_has_no_message_id() {
        let config = MessagingConfig::default().with_system_sendgrid(
            "SG.system-key-0000000000",
            "noreply@recall.example.com",
            "Benefit Reminders",
        );
        let (dispatcher, factory, _) = dispatcher(config).await;
        factory
            .email_mock("noreply@recall.example.com", MessagingProvider::System)
            .set_omit_message_id(true);

        let result = dispatcher
            .send_email(
                &TenantId::new("tenant:1"),
                "jane@example.com",
                "Benefits",
                "hi",
                &SendMetadata::default(),
            )
            .await;
        assert!(result.success);
        assert!(!result.simulated);
        assert!(result.message_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tenant_fails_without_send() {
        let (dispatcher, factory, _) = dispatcher(MessagingConfig::default()).await;
        let result = dispatcher
            .send_sms(&TenantId::new("tenant:ghost"), "+15555550100", "hi", &SendMetadata::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Tenant not found"));
        assert_eq!(factory.builds(), 0);
    }
}
