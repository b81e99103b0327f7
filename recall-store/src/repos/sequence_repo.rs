//! Sequence State Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::{CampaignId, PatientId, PatientSequenceState, SequenceStateId, TenantId};

use crate::error::StoreResult;

/// Patient sequence state repository trait
#[async_trait]
pub trait SequenceStateRepository: Send + Sync {
    /// Insert a new enrollment.
    ///
    /// Fails with `Duplicate` if a row already exists for the
    /// (campaign, patient) pair; the check and insert are atomic.
    async fn create(&self, state: PatientSequenceState) -> StoreResult<PatientSequenceState>;

    /// Get the enrollment for a pair
    async fn get(
        &self,
        campaign_id: &CampaignId,
        patient_id: &PatientId,
    ) -> StoreResult<Option<PatientSequenceState>>;

    /// Active states of the tenant with `next_scheduled_at <= now`, earliest first
    async fn find_due(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PatientSequenceState>>;

    /// Conditionally move `next_scheduled_at` to `lease_until`.
    ///
    /// Succeeds only while the row is active and still scheduled at
    /// `expected_next`. Returns `false` when another worker got there first.
    async fn try_claim(
        &self,
        state_id: &SequenceStateId,
        expected_next: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Persist a state change. Terminal rows cannot be reactivated.
    async fn update(&self, state: PatientSequenceState) -> StoreResult<PatientSequenceState>;
}
