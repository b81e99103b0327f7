//! Tenant Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::{Tenant, TenantId};

use crate::error::StoreResult;

/// Tenant (practice) repository trait
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Get tenant by id
    async fn get(&self, tenant_id: &TenantId) -> StoreResult<Option<Tenant>>;

    /// All tenants that are not suspended
    async fn list_active(&self) -> StoreResult<Vec<Tenant>>;

    /// Increment the usage counter after a delivered send, returning the new count
    async fn record_message_sent(&self, tenant_id: &TenantId) -> StoreResult<u32>;

    /// Start a new billing period for every tenant, returning how many were reset
    async fn reset_usage_counters(&self, period_start: DateTime<Utc>) -> StoreResult<usize>;
}
