//! Client cache
//!
//! Per-tenant cache of resolved provider clients with a fixed TTL. Expiry is
//! driven by the injected [`Clock`] so tests can step time. Settings handlers
//! call [`ClientCache::invalidate`] after a tenant edits credentials.

use chrono::{DateTime, Duration, Utc};
use recall_core::{Clock, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// TTL cache keyed by tenant
pub struct ClientCache<V: Clone> {
    entries: RwLock<HashMap<TenantId, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ClientCache<V> {
    pub fn new(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// Fresh entry for the tenant; expired entries are evicted on read
    pub fn get(&self, tenant_id: &TenantId) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(tenant_id) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(tenant_id);
        None
    }

    pub fn insert(&self, tenant_id: TenantId, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tenant_id, CacheEntry { value, expires_at });
    }

    /// Drop the tenant's entry, returning whether one existed
    pub fn invalidate(&self, tenant_id: &TenantId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(tenant_id)
            .is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
