//! Per-tenant single-flight locks
//!
//! A tick that finds its tenant's lock held returns immediately instead of
//! queueing behind the running one.

use recall_core::TenantId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one tenant's tick
pub type TickGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the tenant's lock if nobody holds it
    pub async fn try_acquire(&self, tenant_id: &TenantId) -> Option<TickGuard> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(tenant_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.try_lock_owned().ok()
    }
}
