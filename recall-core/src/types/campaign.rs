//! Campaign definitions
//!
//! A campaign is either single-shot (one template, sent once per cooldown
//! window) or a sequence of ordered steps driven by the sequence state
//! machine.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{CampaignId, MessageType, StepId, TenantId};
use crate::constants::DEFAULT_TRIGGER_WINDOW_DAYS;
use crate::error::{CoreError, CoreResult};

/// Benefit-expiry window that makes a patient eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    #[serde(rename = "expiring_60")]
    Expiring60,
    #[serde(rename = "expiring_30")]
    Expiring30,
    #[serde(rename = "expiring_14")]
    Expiring14,
    #[serde(rename = "manual")]
    Manual,
    #[serde(other)]
    Other,
}

impl TriggerType {
    /// Look-ahead window in days
    pub fn window_days(&self) -> i64 {
        match self {
            TriggerType::Expiring60 => 60,
            TriggerType::Expiring30 => 30,
            TriggerType::Expiring14 => 14,
            TriggerType::Manual | TriggerType::Other => DEFAULT_TRIGGER_WINDOW_DAYS,
        }
    }
}

/// How a step's send time is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayType {
    /// `now + delay_value` days
    FixedDays,
    /// `expiration_date - delay_value` days
    DaysBeforeExpiry,
}

/// One ordered stage of a sequence campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub step_id: StepId,
    pub campaign_id: CampaignId,
    /// 1-based, contiguous within the campaign
    pub step_number: u32,
    pub message_type: MessageType,
    pub message_template: String,
    pub email_subject: Option<String>,
    pub delay_type: DelayType,
    /// Days
    pub delay_value: u32,
    pub is_active: bool,
}

impl SequenceStep {
    /// Instant at which this step becomes due
    ///
    /// `days_before_expiry` without a known expiration date degrades to `now`.
    pub fn scheduled_at(&self, now: DateTime<Utc>, expiration_date: Option<NaiveDate>) -> DateTime<Utc> {
        let delay = Duration::days(i64::from(self.delay_value));
        match self.delay_type {
            DelayType::FixedDays => now + delay,
            DelayType::DaysBeforeExpiry => match expiration_date {
                Some(date) => date.and_time(NaiveTime::MIN).and_utc() - delay,
                None => now,
            },
        }
    }
}

/// Outreach campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_active: bool,
    pub is_sequence: bool,
    pub trigger_type: TriggerType,
    pub message_type: MessageType,
    pub message_template: String,
    pub email_subject: Option<String>,
    pub min_benefit_amount: Decimal,
    pub auto_stop_on_appointment: bool,
    pub auto_stop_on_response: bool,
    pub auto_stop_on_opt_out: bool,
    pub steps: Vec<SequenceStep>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Active steps ordered by step number
    pub fn active_steps(&self) -> Vec<&SequenceStep> {
        let mut steps: Vec<&SequenceStep> = self.steps.iter().filter(|s| s.is_active).collect();
        steps.sort_by_key(|s| s.step_number);
        steps
    }

    /// Active step with the given number
    pub fn active_step(&self, step_number: u32) -> Option<&SequenceStep> {
        self.steps
            .iter()
            .find(|s| s.is_active && s.step_number == step_number)
    }

    /// First step a new enrollment waits on
    pub fn first_step(&self) -> Option<&SequenceStep> {
        self.active_step(1)
            .or_else(|| self.active_steps().into_iter().next())
    }

    /// Check that step numbers run 1..=n without gaps or duplicates
    pub fn validate_steps(&self) -> CoreResult<()> {
        let mut numbers: Vec<u32> = self.steps.iter().map(|s| s.step_number).collect();
        numbers.sort_unstable();
        for (idx, number) in numbers.iter().enumerate() {
            let expected = idx as u32 + 1;
            if *number != expected {
                return Err(CoreError::InvalidSteps(format!(
                    "campaign {} expected step {} but found {}",
                    self.campaign_id, expected, number
                )));
            }
        }
        Ok(())
    }
}
