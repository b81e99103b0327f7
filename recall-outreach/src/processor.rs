//! Single-shot campaign processor
//!
//! Daily sweep over a tenant's active non-sequence campaigns, plus the
//! manual "send now" path used by the UI.

use chrono::Duration;
use recall_core::{
    personalize, BenefitRecord, Campaign, CampaignId, Channel, Clock, MessageType,
    MessagingProvider, PatientId, SendResult, TenantId,
};
use recall_store::{BenefitsEngine, Repositories};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::OutreachConfig;
use crate::delivery::{reachable_channels, Delivery, DeliveryPipeline};
use crate::error::{OutreachError, OutreachResult};
use crate::metrics;

/// Counts from one automated run, one outcome per patient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachSummary {
    /// At least one channel succeeded
    pub sent: u32,
    /// Every attempted channel failed, or the patient could not be processed
    pub failed: u32,
    /// Inside the cooldown window or no reachable channel
    pub skipped: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatientOutcome {
    Sent,
    Failed,
    Cooldown,
    Unreachable,
}

impl PatientOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            PatientOutcome::Sent => "sent",
            PatientOutcome::Failed => "failed",
            PatientOutcome::Cooldown => "cooldown",
            PatientOutcome::Unreachable => "unreachable",
        }
    }
}

pub struct OutreachProcessor {
    repos: Repositories,
    benefits: Arc<dyn BenefitsEngine>,
    delivery: Arc<DeliveryPipeline>,
    clock: Arc<dyn Clock>,
    config: OutreachConfig,
}

impl OutreachProcessor {
    pub fn new(
        repos: Repositories,
        benefits: Arc<dyn BenefitsEngine>,
        delivery: Arc<DeliveryPipeline>,
        clock: Arc<dyn Clock>,
        config: OutreachConfig,
    ) -> Self {
        Self {
            repos,
            benefits,
            delivery,
            clock,
            config,
        }
    }

    /// Run every active single-shot campaign of the tenant once.
    ///
    /// Only the campaign listing can fail the call. Everything below it is
    /// caught and counted.
    pub async fn process_automated_outreach(
        &self,
        tenant_id: &TenantId,
    ) -> OutreachResult<OutreachSummary> {
        let campaigns = self.repos.campaigns.list_active_for_tenant(tenant_id).await?;
        let mut summary = OutreachSummary::default();

        for campaign in campaigns.iter().filter(|c| c.is_active && !c.is_sequence) {
            let window = campaign.trigger_type.window_days();
            let candidates = match self
                .benefits
                .get_expiring_benefits(tenant_id, window, campaign.min_benefit_amount)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        campaign_id = %campaign.campaign_id,
                        error = %e,
                        "Failed to load outreach candidates, skipping campaign"
                    );
                    continue;
                }
            };

            debug!(
                tenant_id = %tenant_id,
                campaign_id = %campaign.campaign_id,
                window_days = window,
                candidates = candidates.len(),
                "Processing single-shot campaign"
            );

            for record in &candidates {
                let outcome = match self.process_candidate(campaign, record).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            tenant_id = %tenant_id,
                            campaign_id = %campaign.campaign_id,
                            patient_id = %record.patient_id,
                            error = %e,
                            "Outreach failed for patient"
                        );
                        PatientOutcome::Failed
                    }
                };

                metrics::record_patient_outcome(outcome.as_str());
                match outcome {
                    PatientOutcome::Sent => summary.sent += 1,
                    PatientOutcome::Failed => summary.failed += 1,
                    PatientOutcome::Cooldown | PatientOutcome::Unreachable => summary.skipped += 1,
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "Automated outreach complete"
        );
        Ok(summary)
    }

    async fn process_candidate(
        &self,
        campaign: &Campaign,
        record: &BenefitRecord,
    ) -> OutreachResult<PatientOutcome> {
        let since = self.clock.now() - Duration::days(self.config.cooldown_days);
        if self
            .repos
            .outreach_logs
            .has_log_since(&record.patient_id, &campaign.campaign_id, since)
            .await?
        {
            return Ok(PatientOutcome::Cooldown);
        }

        let preferences = self.repos.patients.get_preferences(&record.patient_id).await?;
        let targets = reachable_channels(campaign.message_type, preferences.as_ref(), record);
        if targets.is_empty() {
            return Ok(PatientOutcome::Unreachable);
        }

        let body = personalize(&campaign.message_template, record);
        let subject = self.subject(campaign.email_subject.as_deref(), record);

        let mut any_success = false;
        for (channel, recipient) in targets {
            let result = self
                .send(campaign, record, channel, recipient, &subject, &body)
                .await;
            any_success |= result.success;
        }

        Ok(if any_success {
            PatientOutcome::Sent
        } else {
            PatientOutcome::Failed
        })
    }

    /// Send a campaign's message to one patient right now.
    ///
    /// Skips the cooldown and the campaign's active flag. Benefits are
    /// recomputed so the message carries current figures. With `both`, the
    /// first successful channel result is returned, otherwise the first
    /// failure.
    pub async fn send_manual_outreach(
        &self,
        patient_id: &PatientId,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        message_type: MessageType,
    ) -> OutreachResult<SendResult> {
        let campaign = self
            .repos
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| OutreachError::CampaignNotFound(campaign_id.clone()))?;
        if &campaign.tenant_id != tenant_id {
            return Err(OutreachError::TenantMismatch(format!(
                "campaign {} does not belong to tenant {}",
                campaign_id, tenant_id
            )));
        }

        let patient = self
            .repos
            .patients
            .get(patient_id)
            .await?
            .ok_or_else(|| OutreachError::PatientNotFound(patient_id.clone()))?;
        if &patient.tenant_id != tenant_id {
            return Err(OutreachError::TenantMismatch(format!(
                "patient {} does not belong to tenant {}",
                patient_id, tenant_id
            )));
        }

        let record = self
            .benefits
            .calculate_patient_benefits(patient_id, tenant_id)
            .await?
            .ok_or_else(|| OutreachError::BenefitsUnavailable(patient_id.clone()))?;

        let preferences = self.repos.patients.get_preferences(patient_id).await?;
        let targets = reachable_channels(message_type, preferences.as_ref(), &record);
        if targets.is_empty() {
            info!(
                tenant_id = %tenant_id,
                patient_id = %patient_id,
                message_type = message_type.as_str(),
                "Manual outreach has no reachable channel"
            );
            return Ok(SendResult::failed(
                "Patient has opted out or has no contact for the requested channel",
                MessagingProvider::System,
            ));
        }

        let body = personalize(&campaign.message_template, &record);
        let subject = self.subject(campaign.email_subject.as_deref(), &record);

        let mut first_failure = None;
        let mut first_success = None;
        for (channel, recipient) in targets {
            let result = self
                .send(&campaign, &record, channel, recipient, &subject, &body)
                .await;
            if result.success {
                first_success.get_or_insert(result);
            } else {
                first_failure.get_or_insert(result);
            }
        }

        let result = first_success.or(first_failure).unwrap_or_else(|| {
            SendResult::failed("No channel attempted", MessagingProvider::System)
        });
        info!(
            tenant_id = %tenant_id,
            patient_id = %patient_id,
            campaign_id = %campaign_id,
            success = result.success,
            provider = %result.provider,
            "Manual outreach sent"
        );
        Ok(result)
    }

    fn subject(&self, subject: Option<&str>, record: &BenefitRecord) -> String {
        let template = subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.config.default_email_subject);
        personalize(template, record)
    }

    async fn send(
        &self,
        campaign: &Campaign,
        record: &BenefitRecord,
        channel: Channel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> SendResult {
        self.delivery
            .deliver(Delivery {
                tenant_id: &campaign.tenant_id,
                campaign_id: &campaign.campaign_id,
                patient_id: &record.patient_id,
                channel,
                recipient,
                subject,
                body,
                step: None,
            })
            .await
    }
}
