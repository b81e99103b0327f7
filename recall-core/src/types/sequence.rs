//! Per-patient sequence state
//!
//! State transitions are monotonic: `active -> stopped | completed`. Nothing
//! leaves a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::{CampaignId, PatientId, SequenceStateId, TenantId};
use crate::error::{CoreError, CoreResult};

/// Lifecycle status of an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStatus {
    Active,
    Stopped,
    Completed,
}

impl SequenceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SequenceStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStatus::Active => "active",
            SequenceStatus::Stopped => "stopped",
            SequenceStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sequence ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AppointmentBooked,
    PatientResponded,
    OptedOut,
    ExpiryPassed,
    /// Benefits could not be recomputed at send time
    BenefitsUnavailable,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::AppointmentBooked => "appointment_booked",
            StopReason::PatientResponded => "patient_responded",
            StopReason::OptedOut => "opted_out",
            StopReason::ExpiryPassed => "expiry_passed",
            StopReason::BenefitsUnavailable => "benefits_unavailable",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per (campaign, patient) enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSequenceState {
    pub state_id: SequenceStateId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub patient_id: PatientId,
    /// 0 until the first step has been processed
    pub current_step_number: u32,
    pub status: SequenceStatus,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PatientSequenceState {
    /// Fresh enrollment waiting on its first step
    pub fn enroll(
        tenant_id: TenantId,
        campaign_id: CampaignId,
        patient_id: PatientId,
        next_scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state_id: SequenceStateId::generate(),
            tenant_id,
            campaign_id,
            patient_id,
            current_step_number: 0,
            status: SequenceStatus::Active,
            next_scheduled_at: Some(next_scheduled_at),
            stop_reason: None,
            started_at: now,
            stopped_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Active and scheduled at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == SequenceStatus::Active
            && self.next_scheduled_at.map(|at| at <= now).unwrap_or(false)
    }

    fn ensure_active(&self, to: SequenceStatus) -> CoreResult<()> {
        if self.is_terminal() {
            return Err(CoreError::invalid_transition(self.status.as_str(), to.as_str()));
        }
        Ok(())
    }

    /// Terminate early
    pub fn stop(&mut self, reason: StopReason, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_active(SequenceStatus::Stopped)?;
        self.status = SequenceStatus::Stopped;
        self.stop_reason = Some(reason);
        self.stopped_at = Some(now);
        self.next_scheduled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// No further steps remain
    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_active(SequenceStatus::Completed)?;
        self.status = SequenceStatus::Completed;
        self.completed_at = Some(now);
        self.next_scheduled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Record the processed step and the next due time
    pub fn advance(
        &mut self,
        step_number: u32,
        next_scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_active(SequenceStatus::Active)?;
        self.current_step_number = step_number;
        self.next_scheduled_at = Some(next_scheduled_at);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(now: DateTime<Utc>) -> PatientSequenceState {
        PatientSequenceState::enroll(
            TenantId::new("tenant:1"),
            CampaignId::new("campaign:1"),
            PatientId::new("patient:1"),
            now,
            now,
        )
    }

    #[test]
    fn test_enroll_starts_at_zero() {
        let now = Utc::now();
        let s = state(now);
        assert_eq!(s.current_step_number, 0);
        assert_eq!(s.status, SequenceStatus::Active);
        assert!(s.is_due(now));
        assert!(!s.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn test_stop_is_terminal() {
        let now = Utc::now();
        let mut s = state(now);
        s.stop(StopReason::AppointmentBooked, now).unwrap();

        assert_eq!(s.status, SequenceStatus::Stopped);
        assert_eq!(s.stop_reason, Some(StopReason::AppointmentBooked));
        assert!(!s.is_due(now + Duration::days(365)));

        assert!(s.complete(now).is_err());
        assert!(s.advance(1, now, now).is_err());
        assert!(s.stop(StopReason::OptedOut, now).is_err());
        assert_eq!(s.stop_reason, Some(StopReason::AppointmentBooked));
    }

    #[test]
    fn test_complete_is_terminal() {
        let now = Utc::now();
        let mut s = state(now);
        s.advance(1, now + Duration::days(7), now).unwrap();
        s.complete(now).unwrap();

        assert_eq!(s.current_step_number, 1);
        assert_eq!(s.completed_at, Some(now));
        assert!(s.stop(StopReason::ExpiryPassed, now).is_err());
    }

    #[test]
    fn test_stop_reason_wire_names() {
        assert_eq!(StopReason::AppointmentBooked.as_str(), "appointment_booked");
        assert_eq!(StopReason::PatientResponded.as_str(), "patient_responded");
        assert_eq!(StopReason::OptedOut.as_str(), "opted_out");
        assert_eq!(StopReason::ExpiryPassed.as_str(), "expiry_passed");
    }
}
