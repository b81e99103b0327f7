//! Repository bundle handed to the outreach services

use std::sync::Arc;

use crate::memory::InMemoryStore;
use crate::repos::{
    CampaignRepository, OutreachLogRepository, PatientRepository, SequenceStateRepository,
    TenantRepository,
};

/// Shared handles to every repository
#[derive(Clone)]
pub struct Repositories {
    pub tenants: Arc<dyn TenantRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub outreach_logs: Arc<dyn OutreachLogRepository>,
    pub sequence_states: Arc<dyn SequenceStateRepository>,
}

impl Repositories {
    /// Back every repository with the same in-memory store
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            tenants: store.clone(),
            patients: store.clone(),
            campaigns: store.clone(),
            outreach_logs: store.clone(),
            sequence_states: store,
        }
    }
}
