//! Outreach Log Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::{CampaignId, OutreachLog, PatientId};

use crate::error::StoreResult;

/// Outreach log repository trait
///
/// Rows are append-only from the engine's point of view; delivery status
/// updates arrive later through webhook ingestion.
#[async_trait]
pub trait OutreachLogRepository: Send + Sync {
    /// Append a log row
    async fn create(&self, log: OutreachLog) -> StoreResult<OutreachLog>;

    /// Whether any log exists for the pair created at or after `since`
    async fn has_log_since(
        &self,
        patient_id: &PatientId,
        campaign_id: &CampaignId,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Whether a `responded` log exists for the pair created after `since`
    async fn has_response_since(
        &self,
        patient_id: &PatientId,
        campaign_id: &CampaignId,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
