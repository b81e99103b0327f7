//! Benefits collaborator
//!
//! The engine never computes benefit figures itself; it asks a
//! [`BenefitsEngine`] for the current projection each time it needs one, so
//! message amounts reflect the latest synced insurance data.

use async_trait::async_trait;
use recall_core::{BenefitRecord, Clock, PatientId, TenantId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::repos::PatientRepository;

/// Benefits projection consumed by the outreach engine
#[async_trait]
pub trait BenefitsEngine: Send + Sync {
    /// Patients whose benefits lapse within `days` and whose remaining amount
    /// is at least `min_amount`, soonest expiry first
    async fn get_expiring_benefits(
        &self,
        tenant_id: &TenantId,
        days: i64,
        min_amount: Decimal,
    ) -> StoreResult<Vec<BenefitRecord>>;

    /// Current projection for one patient, `None` when nothing is left to use
    async fn calculate_patient_benefits(
        &self,
        patient_id: &PatientId,
        tenant_id: &TenantId,
    ) -> StoreResult<Option<BenefitRecord>>;

    /// Recompute and retain the projection for every patient of a tenant,
    /// returning how many records were captured
    async fn snapshot_benefits(&self, tenant_id: &TenantId) -> StoreResult<usize>;
}

/// Benefits engine computed from patient and insurance rows
pub struct RepositoryBenefitsEngine {
    patients: Arc<dyn PatientRepository>,
    clock: Arc<dyn Clock>,
    snapshots: RwLock<HashMap<TenantId, Vec<BenefitRecord>>>,
}

impl RepositoryBenefitsEngine {
    pub fn new(patients: Arc<dyn PatientRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            patients,
            clock,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Records captured by the last snapshot of a tenant
    pub async fn latest_snapshot(&self, tenant_id: &TenantId) -> Option<Vec<BenefitRecord>> {
        self.snapshots.read().await.get(tenant_id).cloned()
    }

    async fn project_all(&self, tenant_id: &TenantId) -> StoreResult<Vec<BenefitRecord>> {
        let patients = self.patients.list_for_tenant(tenant_id).await?;
        let mut records = Vec::with_capacity(patients.len());
        for patient in patients {
            if let Some(record) = self
                .calculate_patient_benefits(&patient.patient_id, tenant_id)
                .await?
            {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            a.days_remaining
                .cmp(&b.days_remaining)
                .then(a.patient_id.cmp(&b.patient_id))
        });
        Ok(records)
    }
}

#[async_trait]
impl BenefitsEngine for RepositoryBenefitsEngine {
    async fn get_expiring_benefits(
        &self,
        tenant_id: &TenantId,
        days: i64,
        min_amount: Decimal,
    ) -> StoreResult<Vec<BenefitRecord>> {
        let records: Vec<BenefitRecord> = self
            .project_all(tenant_id)
            .await?
            .into_iter()
            .filter(|r| r.days_remaining <= days && r.remaining_benefits >= min_amount)
            .collect();

        debug!(
            tenant_id = %tenant_id,
            days = days,
            min_amount = %min_amount,
            count = records.len(),
            "Expiring benefits computed"
        );
        Ok(records)
    }

    async fn calculate_patient_benefits(
        &self,
        patient_id: &PatientId,
        tenant_id: &TenantId,
    ) -> StoreResult<Option<BenefitRecord>> {
        let Some(patient) = self.patients.get(patient_id).await? else {
            return Ok(None);
        };
        if &patient.tenant_id != tenant_id || !patient.is_active {
            return Ok(None);
        }
        let Some(insurance) = self.patients.get_primary_insurance(patient_id).await? else {
            return Ok(None);
        };

        let today = self.clock.now().date_naive();
        if insurance.has_expired(today) || insurance.remaining_benefits <= Decimal::ZERO {
            return Ok(None);
        }

        Ok(Some(BenefitRecord {
            patient_id: patient.patient_id.clone(),
            tenant_id: tenant_id.clone(),
            patient_name: patient.full_name(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            remaining_benefits: insurance.remaining_benefits,
            expiration_date: insurance.expiration_date,
            days_remaining: (insurance.expiration_date - today).num_days(),
            carrier: insurance.carrier_name.clone(),
        }))
    }

    async fn snapshot_benefits(&self, tenant_id: &TenantId) -> StoreResult<usize> {
        let records = self.project_all(tenant_id).await?;
        let count = records.len();
        self.snapshots.write().await.insert(tenant_id.clone(), records);
        info!(tenant_id = %tenant_id, count = count, "Benefits snapshot stored");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::{NaiveDate, TimeZone, Utc};
    use recall_core::{Insurance, ManualClock, Patient};
    use std::str::FromStr;

    async fn seed(store: &InMemoryStore, id: &str, remaining: &str, expires: NaiveDate) {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        store
            .insert_patient(Patient {
                patient_id: PatientId::new(id),
                tenant_id: TenantId::new("tenant:1"),
                first_name: "Pat".to_string(),
                last_name: id.to_string(),
                email: Some(format!("{}@example.com", id)),
                phone: None,
                is_active: true,
                created_at: now,
            })
            .await;
        store
            .insert_insurance(Insurance {
                insurance_id: format!("ins:{}", id),
                patient_id: PatientId::new(id),
                carrier_name: Some("Delta Dental".to_string()),
                is_primary: true,
                is_active: true,
                annual_maximum: Decimal::from(1500),
                used_benefits: Decimal::ZERO,
                remaining_benefits: Decimal::from_str(remaining).unwrap(),
                expiration_date: expires,
            })
            .await;
    }

    fn engine(store: Arc<InMemoryStore>) -> RepositoryBenefitsEngine {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap(),
        ));
        RepositoryBenefitsEngine::new(store, clock)
    }

    #[tokio::test]
    async fn test_expiring_window_and_minimum() {
        let store = Arc::new(InMemoryStore::new());
        let ymd = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        seed(&store, "p1", "500", ymd(12, 31)).await; // 60 days
        seed(&store, "p2", "50", ymd(11, 20)).await; // below minimum
        seed(&store, "p3", "900", ymd(11, 15)).await; // 14 days
        seed(&store, "p4", "900", ymd(10, 1)).await; // expired

        let engine = engine(store);
        let tenant = TenantId::new("tenant:1");

        let within_60 = engine
            .get_expiring_benefits(&tenant, 60, Decimal::from(100))
            .await
            .unwrap();
        let ids: Vec<&str> = within_60.iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1"]);
        assert_eq!(within_60[0].days_remaining, 14);

        let within_30 = engine
            .get_expiring_benefits(&tenant, 30, Decimal::from(100))
            .await
            .unwrap();
        assert_eq!(within_30.len(), 1);
    }

    #[tokio::test]
    async fn test_calculate_respects_tenant() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "p1", "500", NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()).await;
        let engine = engine(store);

        let record = engine
            .calculate_patient_benefits(&PatientId::new("p1"), &TenantId::new("tenant:1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.patient_name, "Pat p1");
        assert_eq!(record.carrier.as_deref(), Some("Delta Dental"));

        assert!(engine
            .calculate_patient_benefits(&PatientId::new("p1"), &TenantId::new("tenant:2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_snapshot_retained() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "p1", "500", NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()).await;
        let engine = engine(store);
        let tenant = TenantId::new("tenant:1");

        assert!(engine.latest_snapshot(&tenant).await.is_none());
        assert_eq!(engine.snapshot_benefits(&tenant).await.unwrap(), 1);
        assert_eq!(engine.latest_snapshot(&tenant).await.unwrap().len(), 1);
    }
}
