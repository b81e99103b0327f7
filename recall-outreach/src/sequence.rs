//! Sequence state machine
//!
//! Enrollment creates one state row per (campaign, patient). Each tick
//! walks the tenant's due states and, per state:
//!
//! 1. claims it (conditional lease on `next_scheduled_at`)
//! 2. evaluates stop conditions, which always win over sending
//! 3. completes it when no active step follows the current one
//! 4. sends the next step on every reachable channel
//! 5. advances the step pointer and schedules the following run
//!
//! The whole tick runs under a per-tenant single-flight lock.

use chrono::Duration;
use recall_core::{
    personalize, BenefitRecord, Campaign, CampaignId, Clock, Insurance, PatientId,
    PatientSequenceState, SendResult, SequenceStep, StopReason, TenantId,
};
use recall_store::{BenefitsEngine, Repositories, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::OutreachConfig;
use crate::delivery::{reachable_channels, Delivery, DeliveryPipeline};
use crate::error::{OutreachError, OutreachResult};
use crate::metrics;
use crate::tick_lock::TenantLocks;

/// Counts from one sequence tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSummary {
    /// Due states claimed and handled, including stops and completions
    pub processed: u32,
    pub stopped: u32,
    pub completed: u32,
}

/// Counts from a bulk enrollment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSummary {
    pub enrolled: u32,
    pub skipped: u32,
}

/// What a tick did with one due state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    /// Campaign inactive or missing, or another worker holds the claim
    Untouched,
    Stopped,
    Completed,
    Advanced,
}

pub struct SequenceEngine {
    repos: Repositories,
    benefits: Arc<dyn BenefitsEngine>,
    delivery: Arc<DeliveryPipeline>,
    locks: TenantLocks,
    clock: Arc<dyn Clock>,
    config: OutreachConfig,
}

impl SequenceEngine {
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
            locks: TenantLocks::new(),
            clock,
            config,
        }
    }

    async fn sequence_campaign(&self, campaign_id: &CampaignId) -> OutreachResult<Campaign> {
        let campaign = self
            .repos
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| OutreachError::CampaignNotFound(campaign_id.clone()))?;
        if !campaign.is_sequence {
            return Err(OutreachError::NotASequence(campaign_id.clone()));
        }
        if campaign.active_steps().is_empty() {
            return Err(OutreachError::NoActiveSteps(campaign_id.clone()));
        }
        campaign
            .validate_steps()
            .map_err(|e| OutreachError::InvalidCampaign(e.to_string()))?;
        Ok(campaign)
    }

    // ========================================================================
    // Enrollment
    // ========================================================================

    /// Attach one patient to a sequence campaign
    pub async fn enroll_patient_in_sequence(
        &self,
        campaign_id: &CampaignId,
        patient_id: &PatientId,
    ) -> OutreachResult<PatientSequenceState> {
        let campaign = self.sequence_campaign(campaign_id).await?;
        self.enroll(&campaign, patient_id).await
    }

    async fn enroll(
        &self,
        campaign: &Campaign,
        patient_id: &PatientId,
    ) -> OutreachResult<PatientSequenceState> {
        let patient = self
            .repos
            .patients
            .get(patient_id)
            .await?
            .ok_or_else(|| OutreachError::PatientNotFound(patient_id.clone()))?;
        if patient.tenant_id != campaign.tenant_id {
            return Err(OutreachError::TenantMismatch(format!(
                "patient {} does not belong to tenant {}",
                patient_id, campaign.tenant_id
            )));
        }

        if self
            .repos
            .sequence_states
            .get(&campaign.campaign_id, patient_id)
            .await?
            .is_some()
        {
            return Err(duplicate(campaign, patient_id));
        }

        let first_step = campaign
            .first_step()
            .ok_or_else(|| OutreachError::NoActiveSteps(campaign.campaign_id.clone()))?;
        let now = self.clock.now();
        let expiration = self
            .repos
            .patients
            .get_primary_insurance(patient_id)
            .await?
            .map(|i| i.expiration_date);
        let next_scheduled_at = first_step.scheduled_at(now, expiration);

        let state = PatientSequenceState::enroll(
            campaign.tenant_id.clone(),
            campaign.campaign_id.clone(),
            patient_id.clone(),
            next_scheduled_at,
            now,
        );

        // The store re-checks the pair atomically
        let state = match self.repos.sequence_states.create(state).await {
            Ok(state) => state,
            Err(StoreError::Duplicate { .. }) => return Err(duplicate(campaign, patient_id)),
            Err(e) => return Err(e.into()),
        };

        info!(
            tenant_id = %campaign.tenant_id,
            campaign_id = %campaign.campaign_id,
            patient_id = %patient_id,
            next_scheduled_at = %next_scheduled_at,
            "Patient enrolled in sequence"
        );
        Ok(state)
    }

    /// Enroll every patient the single-shot eligibility query would pick
    pub async fn enroll_patients_in_sequence(
        &self,
        campaign_id: &CampaignId,
        tenant_id: &TenantId,
    ) -> OutreachResult<EnrollmentSummary> {
        let campaign = self.sequence_campaign(campaign_id).await?;
        if &campaign.tenant_id != tenant_id {
            return Err(OutreachError::TenantMismatch(format!(
                "campaign {} does not belong to tenant {}",
                campaign_id, tenant_id
            )));
        }

        let candidates = self
            .benefits
            .get_expiring_benefits(
                tenant_id,
                campaign.trigger_type.window_days(),
                campaign.min_benefit_amount,
            )
            .await?;

        let mut summary = EnrollmentSummary::default();
        for record in &candidates {
            match self.enroll(&campaign, &record.patient_id).await {
                Ok(_) => summary.enrolled += 1,
                Err(e) => {
                    debug!(
                        campaign_id = %campaign_id,
                        patient_id = %record.patient_id,
                        reason = %e,
                        "Enrollment skipped"
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            campaign_id = %campaign_id,
            enrolled = summary.enrolled,
            skipped = summary.skipped,
            "Bulk enrollment complete"
        );
        Ok(summary)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Process every due state of the tenant.
    ///
    /// An overlapping call for the same tenant returns zero counts without
    /// touching anything.
    pub async fn process_sequences(&self, tenant_id: &TenantId) -> OutreachResult<SequenceSummary> {
        let Some(_guard) = self.locks.try_acquire(tenant_id).await else {
            info!(tenant_id = %tenant_id, "Sequence tick already running, skipping");
            return Ok(SequenceSummary::default());
        };

        let now = self.clock.now();
        let due = self.repos.sequence_states.find_due(tenant_id, now).await?;
        if due.is_empty() {
            return Ok(SequenceSummary::default());
        }
        debug!(tenant_id = %tenant_id, due = due.len(), "Processing due sequence states");

        let mut campaigns: HashMap<CampaignId, Option<Campaign>> = HashMap::new();
        let mut summary = SequenceSummary::default();

        for state in due {
            if !campaigns.contains_key(&state.campaign_id) {
                let loaded = match self.repos.campaigns.get(&state.campaign_id).await {
                    Ok(campaign) => campaign,
                    Err(e) => {
                        warn!(
                            campaign_id = %state.campaign_id,
                            error = %e,
                            "Failed to load sequence campaign"
                        );
                        continue;
                    }
                };
                campaigns.insert(state.campaign_id.clone(), loaded);
            }
            let Some(campaign) = campaigns
                .get(&state.campaign_id)
                .and_then(|c| c.as_ref())
                .filter(|c| c.is_active && c.is_sequence)
            else {
                continue;
            };

            let state_id = state.state_id.clone();
            let patient_id = state.patient_id.clone();
            match self.process_state(campaign, state).await {
                Ok(Transition::Untouched) => {}
                Ok(Transition::Stopped) => {
                    summary.processed += 1;
                    summary.stopped += 1;
                }
                Ok(Transition::Completed) => {
                    summary.processed += 1;
                    summary.completed += 1;
                }
                Ok(Transition::Advanced) => summary.processed += 1,
                Err(e) => warn!(
                    tenant_id = %tenant_id,
                    campaign_id = %campaign.campaign_id,
                    patient_id = %patient_id,
                    state_id = %state_id,
                    error = %e,
                    "Sequence state processing failed"
                ),
            }
        }

        info!(
            tenant_id = %tenant_id,
            processed = summary.processed,
            stopped = summary.stopped,
            completed = summary.completed,
            "Sequence tick complete"
        );
        Ok(summary)
    }

    async fn process_state(
        &self,
        campaign: &Campaign,
        mut state: PatientSequenceState,
    ) -> OutreachResult<Transition> {
        let now = self.clock.now();
        let Some(expected_next) = state.next_scheduled_at else {
            return Ok(Transition::Untouched);
        };

        let lease_until = now + Duration::seconds(self.config.claim_lease_secs);
        if !self
            .repos
            .sequence_states
            .try_claim(&state.state_id, expected_next, lease_until)
            .await?
        {
            debug!(state_id = %state.state_id, "Sequence state claimed elsewhere");
            return Ok(Transition::Untouched);
        }

        let insurance = self
            .repos
            .patients
            .get_primary_insurance(&state.patient_id)
            .await?;

        if let Some(reason) = self
            .stop_reason(campaign, &state, insurance.as_ref())
            .await?
        {
            return self.stop(state, reason).await;
        }

        let Some(step) = next_active_step(campaign, state.current_step_number) else {
            state.complete(now)?;
            self.repos.sequence_states.update(state.clone()).await?;
            metrics::record_sequence_completed();
            info!(
                campaign_id = %state.campaign_id,
                patient_id = %state.patient_id,
                "Sequence completed"
            );
            return Ok(Transition::Completed);
        };

        let Some(record) = self
            .benefits
            .calculate_patient_benefits(&state.patient_id, &state.tenant_id)
            .await?
        else {
            return self.stop(state, StopReason::BenefitsUnavailable).await;
        };

        self.send_step(campaign, step, &record).await?;

        let following = next_active_step(campaign, step.step_number).unwrap_or(step);
        let next_at = following.scheduled_at(now, insurance.map(|i| i.expiration_date));
        state.advance(step.step_number, next_at, now)?;
        self.repos.sequence_states.update(state.clone()).await?;

        debug!(
            campaign_id = %state.campaign_id,
            patient_id = %state.patient_id,
            step_number = step.step_number,
            next_scheduled_at = %next_at,
            "Sequence advanced"
        );
        Ok(Transition::Advanced)
    }

    /// First stop condition that holds, checked in a fixed order
    async fn stop_reason(
        &self,
        campaign: &Campaign,
        state: &PatientSequenceState,
        insurance: Option<&Insurance>,
    ) -> OutreachResult<Option<StopReason>> {
        let now = self.clock.now();

        if campaign.auto_stop_on_appointment
            && self
                .repos
                .patients
                .has_appointment_booked_since(&state.patient_id, state.started_at, now)
                .await?
        {
            return Ok(Some(StopReason::AppointmentBooked));
        }

        if campaign.auto_stop_on_response
            && self
                .repos
                .outreach_logs
                .has_response_since(&state.patient_id, &state.campaign_id, state.started_at)
                .await?
        {
            return Ok(Some(StopReason::PatientResponded));
        }

        if campaign.auto_stop_on_opt_out {
            let preferences = self.repos.patients.get_preferences(&state.patient_id).await?;
            if preferences.map(|p| p.fully_opted_out()).unwrap_or(false) {
                return Ok(Some(StopReason::OptedOut));
            }
        }

        if insurance
            .map(|i| i.has_expired(now.date_naive()))
            .unwrap_or(false)
        {
            return Ok(Some(StopReason::ExpiryPassed));
        }

        Ok(None)
    }

    async fn stop(
        &self,
        mut state: PatientSequenceState,
        reason: StopReason,
    ) -> OutreachResult<Transition> {
        state.stop(reason, self.clock.now())?;
        self.repos.sequence_states.update(state.clone()).await?;
        metrics::record_sequence_stopped(reason);
        info!(
            campaign_id = %state.campaign_id,
            patient_id = %state.patient_id,
            step_number = state.current_step_number,
            reason = reason.as_str(),
            "Sequence stopped"
        );
        Ok(Transition::Stopped)
    }

    /// Send one step on every reachable channel of its message type.
    ///
    /// Opted-out channels and channels without a contact are skipped with no
    /// log row. Returns the results of the channels actually attempted.
    async fn send_step(
        &self,
        campaign: &Campaign,
        step: &SequenceStep,
        record: &BenefitRecord,
    ) -> OutreachResult<Vec<SendResult>> {
        let preferences = self.repos.patients.get_preferences(&record.patient_id).await?;
        let targets = reachable_channels(step.message_type, preferences.as_ref(), record);

        for channel in step.message_type.channels() {
            if !targets.iter().any(|(c, _)| *c == channel) {
                metrics::record_step_skipped(channel);
                debug!(
                    campaign_id = %campaign.campaign_id,
                    patient_id = %record.patient_id,
                    step_number = step.step_number,
                    channel = %channel,
                    "Step channel skipped"
                );
            }
        }

        let body = personalize(&step.message_template, record);
        let subject_template = step
            .email_subject
            .as_deref()
            .or(campaign.email_subject.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.config.default_email_subject);
        let subject = personalize(subject_template, record);

        let mut results = Vec::with_capacity(targets.len());
        for (channel, recipient) in targets {
            let result = self
                .delivery
                .deliver(Delivery {
                    tenant_id: &campaign.tenant_id,
                    campaign_id: &campaign.campaign_id,
                    patient_id: &record.patient_id,
                    channel,
                    recipient,
                    subject: &subject,
                    body: &body,
                    step: Some(step),
                })
                .await;
            metrics::record_step_sent(channel, result.success);
            results.push(result);
        }
        Ok(results)
    }
}

/// First active step numbered after `current`
fn next_active_step(campaign: &Campaign, current: u32) -> Option<&SequenceStep> {
    campaign
        .steps
        .iter()
        .filter(|s| s.is_active && s.step_number > current)
        .min_by_key(|s| s.step_number)
}

fn duplicate(campaign: &Campaign, patient_id: &PatientId) -> OutreachError {
    OutreachError::DuplicateEnrollment {
        campaign_id: campaign.campaign_id.clone(),
        patient_id: patient_id.clone(),
    }
}
