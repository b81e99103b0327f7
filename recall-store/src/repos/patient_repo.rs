//! Patient Repository
//!
//! Read side of patient, insurance, preference and appointment records.
//! Writes belong to practice-management sync and are not part of this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::{Insurance, Patient, PatientId, PatientPreferences, TenantId};

use crate::error::StoreResult;

/// Patient repository trait
#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Get patient by id
    async fn get(&self, patient_id: &PatientId) -> StoreResult<Option<Patient>>;

    /// Active patients of a tenant
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Patient>>;

    /// Opt-out flags; `None` means no preferences recorded (nothing opted out)
    async fn get_preferences(&self, patient_id: &PatientId)
        -> StoreResult<Option<PatientPreferences>>;

    /// The active primary insurance row, if any
    async fn get_primary_insurance(&self, patient_id: &PatientId) -> StoreResult<Option<Insurance>>;

    /// Whether a future appointment with status `scheduled` was created after `since`
    async fn has_appointment_booked_since(
        &self,
        patient_id: &PatientId,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
