//! Outreach Error Types

use recall_core::{CampaignId, CoreError, PatientId};
use recall_messaging::MessagingError;
use recall_store::StoreError;
use thiserror::Error;

/// Outreach Result type
pub type OutreachResult<T> = Result<T, OutreachError>;

/// Errors surfaced to callers of the outreach operations
#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    #[error("Patient not found: {0}")]
    PatientNotFound(PatientId),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// Enrollment into a single-shot campaign
    #[error("Campaign {0} is not a sequence")]
    NotASequence(CampaignId),

    #[error("Campaign {0} has no active steps")]
    NoActiveSteps(CampaignId),

    /// Step numbers do not run 1..=n
    #[error("Invalid campaign: {0}")]
    InvalidCampaign(String),

    #[error("Patient {patient_id} is already enrolled in campaign {campaign_id}")]
    DuplicateEnrollment {
        campaign_id: CampaignId,
        patient_id: PatientId,
    },

    /// Benefits collaborator returned nothing for the patient
    #[error("No current benefits for patient {0}")]
    BenefitsUnavailable(PatientId),

    /// Entity belongs to another tenant
    #[error("Tenant mismatch: {0}")]
    TenantMismatch(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl OutreachError {
    /// Whether an HTTP caller should map this to a 4xx response
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::CampaignNotFound(_)
                | Self::PatientNotFound(_)
                | Self::TenantNotFound(_)
                | Self::NotASequence(_)
                | Self::NoActiveSteps(_)
                | Self::InvalidCampaign(_)
                | Self::DuplicateEnrollment { .. }
                | Self::BenefitsUnavailable(_)
                | Self::TenantMismatch(_)
        )
    }
}

impl From<CoreError> for OutreachError {
    fn from(err: CoreError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_mapping() {
        let dup = OutreachError::DuplicateEnrollment {
            campaign_id: CampaignId::new("c1"),
            patient_id: PatientId::new("p1"),
        };
        assert!(dup.is_client_error());
        assert!(dup.to_string().contains("already enrolled"));

        let store = OutreachError::Store(StoreError::database("connection reset"));
        assert!(!store.is_client_error());
    }
}
