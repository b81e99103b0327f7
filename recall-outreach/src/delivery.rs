//! Send-and-record pipeline shared by every outreach path
//!
//! usage gate -> dispatcher -> log writer -> usage counter

use recall_core::{
    BenefitRecord, CampaignId, Channel, MessageType, MessagingProvider, PatientId,
    PatientPreferences, SendResult, SequenceStep, TenantId,
};
use recall_messaging::{MessageDispatcher, SendMetadata};
use recall_store::TenantRepository;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::log_writer::{LogEntry, OutreachLogWriter};
use crate::metrics;

/// Error text recorded when the tenant is out of monthly messages
pub const USAGE_LIMIT_REACHED: &str = "Monthly message limit reached";

/// Channels of `message_type` the patient can be reached on, with the
/// recipient address. Opted-out channels and missing contacts are dropped.
pub fn reachable_channels<'a>(
    message_type: MessageType,
    preferences: Option<&PatientPreferences>,
    record: &'a BenefitRecord,
) -> Vec<(Channel, &'a str)> {
    message_type
        .channels()
        .into_iter()
        .filter(|channel| !preferences.map(|p| p.is_opted_out(*channel)).unwrap_or(false))
        .filter_map(|channel| record.contact_for(channel).map(|to| (channel, to)))
        .collect()
}

/// One rendered message bound for one channel
#[derive(Debug, Clone)]
pub struct Delivery<'a> {
    pub tenant_id: &'a TenantId,
    pub campaign_id: &'a CampaignId,
    pub patient_id: &'a PatientId,
    pub channel: Channel,
    pub recipient: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub step: Option<&'a SequenceStep>,
}

pub struct DeliveryPipeline {
    tenants: Arc<dyn TenantRepository>,
    dispatcher: Arc<MessageDispatcher>,
    log_writer: Arc<OutreachLogWriter>,
}

impl DeliveryPipeline {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        dispatcher: Arc<MessageDispatcher>,
        log_writer: Arc<OutreachLogWriter>,
    ) -> Self {
        Self {
            tenants,
            dispatcher,
            log_writer,
        }
    }

    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    /// Send, log, and count. Never fails; problems become a failed result.
    pub async fn deliver(&self, delivery: Delivery<'_>) -> SendResult {
        let result = match self.check_usage(delivery.tenant_id).await {
            Some(rejection) => rejection,
            None => {
                let metadata = SendMetadata {
                    patient_id: Some(delivery.patient_id.clone()),
                    campaign_id: Some(delivery.campaign_id.clone()),
                    step_number: delivery.step.map(|s| s.step_number),
                };
                self.dispatcher
                    .send(
                        delivery.channel,
                        delivery.tenant_id,
                        delivery.recipient,
                        delivery.subject,
                        delivery.body,
                        &metadata,
                    )
                    .await
            }
        };

        self.log_writer
            .log(LogEntry {
                tenant_id: delivery.tenant_id,
                campaign_id: delivery.campaign_id,
                patient_id: delivery.patient_id,
                channel: delivery.channel,
                content: delivery.body,
                recipient: delivery.recipient,
                result: &result,
                step: delivery.step,
            })
            .await;

        if result.success && !result.simulated {
            match self.tenants.record_message_sent(delivery.tenant_id).await {
                Ok(count) => debug!(tenant_id = %delivery.tenant_id, count, "Usage counter incremented"),
                Err(e) => warn!(
                    tenant_id = %delivery.tenant_id,
                    error = %e,
                    "Failed to increment usage counter"
                ),
            }
        }

        result
    }

    /// `Some(failed result)` when the tenant has no capacity left
    async fn check_usage(&self, tenant_id: &TenantId) -> Option<SendResult> {
        match self.tenants.get(tenant_id).await {
            Ok(Some(tenant)) if !tenant.usage.has_capacity() => {
                metrics::record_usage_rejection();
                warn!(
                    tenant_id = %tenant_id,
                    sent = tenant.usage.messages_sent_this_period,
                    limit = tenant.usage.monthly_message_limit.unwrap_or_default(),
                    "Send blocked by monthly message limit"
                );
                Some(SendResult::failed(USAGE_LIMIT_REACHED, MessagingProvider::System))
            }
            // Missing tenants surface through provider resolution
            Ok(_) => None,
            Err(e) => Some(SendResult::failed(
                format!("Usage check failed: {}", e),
                MessagingProvider::System,
            )),
        }
    }
}
