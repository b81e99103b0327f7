//! Campaign Repository

use async_trait::async_trait;
use recall_core::{Campaign, CampaignId, TenantId};

use crate::error::StoreResult;

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Get campaign (with its steps) by id
    async fn get(&self, campaign_id: &CampaignId) -> StoreResult<Option<Campaign>>;

    /// Active campaigns of a tenant, both single-shot and sequence
    async fn list_active_for_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Campaign>>;
}
