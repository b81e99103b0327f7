//! Outreach service facade
//!
//! Wires repositories, the benefits collaborator and the messaging layer
//! into the operations HTTP controllers and the scheduler call.

use chrono::{DateTime, Utc};
use recall_core::{
    CampaignId, Clock, MessageType, PatientId, PatientSequenceState, SendResult, SystemClock,
    Tenant, TenantId,
};
use recall_messaging::{
    ClientFactory, CredentialResolver, HttpClientFactory, MessageDispatcher, MessagingConfig,
};
use recall_store::{BenefitsEngine, Repositories};
use std::sync::Arc;
use tracing::info;

use crate::config::OutreachConfig;
use crate::delivery::DeliveryPipeline;
use crate::error::OutreachResult;
use crate::log_writer::OutreachLogWriter;
use crate::processor::{OutreachProcessor, OutreachSummary};
use crate::sequence::{EnrollmentSummary, SequenceEngine, SequenceSummary};

pub struct OutreachService {
    repos: Repositories,
    benefits: Arc<dyn BenefitsEngine>,
    resolver: Arc<CredentialResolver>,
    processor: OutreachProcessor,
    sequences: SequenceEngine,
}

impl OutreachService {
    pub fn new(
        repos: Repositories,
        benefits: Arc<dyn BenefitsEngine>,
        factory: Arc<dyn ClientFactory>,
        messaging: Arc<MessagingConfig>,
        config: OutreachConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = Arc::new(CredentialResolver::new(
            repos.tenants.clone(),
            factory,
            messaging.clone(),
            clock.clone(),
        ));
        let dispatcher = Arc::new(MessageDispatcher::new(resolver.clone(), messaging));
        let log_writer = Arc::new(OutreachLogWriter::new(
            repos.outreach_logs.clone(),
            clock.clone(),
            &config,
        ));
        let delivery = Arc::new(DeliveryPipeline::new(
            repos.tenants.clone(),
            dispatcher,
            log_writer,
        ));

        let processor = OutreachProcessor::new(
            repos.clone(),
            benefits.clone(),
            delivery.clone(),
            clock.clone(),
            config.clone(),
        );
        let sequences = SequenceEngine::new(repos.clone(), benefits.clone(), delivery, clock, config);

        Self {
            repos,
            benefits,
            resolver,
            processor,
            sequences,
        }
    }

    /// Production wiring: real provider clients, wall clock, env config
    pub fn from_env(repos: Repositories, benefits: Arc<dyn BenefitsEngine>) -> Self {
        let messaging = Arc::new(MessagingConfig::from_env());
        let factory = Arc::new(HttpClientFactory::from_config(&messaging));
        Self::new(
            repos,
            benefits,
            factory,
            messaging,
            OutreachConfig::from_env(),
            Arc::new(SystemClock),
        )
    }

    pub async fn process_automated_outreach(
        &self,
        tenant_id: &TenantId,
    ) -> OutreachResult<OutreachSummary> {
        self.processor.process_automated_outreach(tenant_id).await
    }

    pub async fn process_sequences(&self, tenant_id: &TenantId) -> OutreachResult<SequenceSummary> {
        self.sequences.process_sequences(tenant_id).await
    }

    pub async fn send_manual_outreach(
        &self,
        patient_id: &PatientId,
        tenant_id: &TenantId,
        campaign_id: &CampaignId,
        message_type: MessageType,
    ) -> OutreachResult<SendResult> {
        self.processor
            .send_manual_outreach(patient_id, tenant_id, campaign_id, message_type)
            .await
    }

    pub async fn enroll_patient_in_sequence(
        &self,
        campaign_id: &CampaignId,
        patient_id: &PatientId,
    ) -> OutreachResult<PatientSequenceState> {
        self.sequences
            .enroll_patient_in_sequence(campaign_id, patient_id)
            .await
    }

    pub async fn enroll_patients_in_sequence(
        &self,
        campaign_id: &CampaignId,
        tenant_id: &TenantId,
    ) -> OutreachResult<EnrollmentSummary> {
        self.sequences
            .enroll_patients_in_sequence(campaign_id, tenant_id)
            .await
    }

    /// Enrollment status for a pair, if enrolled
    pub async fn sequence_state(
        &self,
        campaign_id: &CampaignId,
        patient_id: &PatientId,
    ) -> OutreachResult<Option<PatientSequenceState>> {
        Ok(self.repos.sequence_states.get(campaign_id, patient_id).await?)
    }

    /// Drop cached provider clients after a tenant edits its messaging settings
    pub fn invalidate_messaging_config(&self, tenant_id: &TenantId) {
        self.resolver.invalidate(tenant_id);
        info!(tenant_id = %tenant_id, "Messaging config invalidated");
    }

    pub fn invalidate_all_messaging_config(&self) {
        self.resolver.invalidate_all();
    }

    pub async fn active_tenants(&self) -> OutreachResult<Vec<Tenant>> {
        Ok(self.repos.tenants.list_active().await?)
    }

    pub async fn snapshot_benefits(&self, tenant_id: &TenantId) -> OutreachResult<usize> {
        Ok(self.benefits.snapshot_benefits(tenant_id).await?)
    }

    /// Start a new usage period for every tenant
    pub async fn reset_usage_counters(&self, period_start: DateTime<Utc>) -> OutreachResult<usize> {
        let reset = self.repos.tenants.reset_usage_counters(period_start).await?;
        info!(tenants = reset, period_start = %period_start, "Usage counters reset");
        Ok(reset)
    }
}
