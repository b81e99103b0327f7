//! In-memory store
//!
//! Implements every repository trait over `tokio::sync::RwLock` maps. Used by
//! tests and local development; supports simple fault injection so batch
//! resilience and log-write retries can be exercised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::{
    Appointment, Campaign, CampaignId, Insurance, OutreachLog, OutreachStatus, Patient,
    PatientId, PatientPreferences, PatientSequenceState, SequenceStateId, Tenant, TenantId,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::repos::{
    CampaignRepository, OutreachLogRepository, PatientRepository, SequenceStateRepository,
    TenantRepository,
};

/// In-memory implementation of all repositories
pub struct InMemoryStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    patients: RwLock<HashMap<PatientId, Patient>>,
    insurance: RwLock<HashMap<PatientId, Vec<Insurance>>>,
    preferences: RwLock<HashMap<PatientId, PatientPreferences>>,
    appointments: RwLock<HashMap<PatientId, Vec<Appointment>>>,
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
    logs: RwLock<Vec<OutreachLog>>,
    states: RwLock<HashMap<SequenceStateId, PatientSequenceState>>,
    /// Number of upcoming log writes that should fail
    pending_log_write_failures: AtomicU32,
    log_write_attempts: AtomicU32,
    /// Patients whose log lookups return an error
    failing_patients: std::sync::RwLock<HashSet<PatientId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            patients: RwLock::new(HashMap::new()),
            insurance: RwLock::new(HashMap::new()),
            preferences: RwLock::new(HashMap::new()),
            appointments: RwLock::new(HashMap::new()),
            campaigns: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            states: RwLock::new(HashMap::new()),
            pending_log_write_failures: AtomicU32::new(0),
            log_write_attempts: AtomicU32::new(0),
            failing_patients: std::sync::RwLock::new(HashSet::new()),
        }
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.tenant_id.clone(), tenant);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.patients.write().await.insert(patient.patient_id.clone(), patient);
    }

    pub async fn insert_insurance(&self, insurance: Insurance) {
        self.insurance
            .write()
            .await
            .entry(insurance.patient_id.clone())
            .or_default()
            .push(insurance);
    }

    /// Replace all insurance rows of a patient
    pub async fn replace_insurance(&self, patient_id: &PatientId, rows: Vec<Insurance>) {
        self.insurance.write().await.insert(patient_id.clone(), rows);
    }

    pub async fn set_preferences(&self, preferences: PatientPreferences) {
        self.preferences
            .write()
            .await
            .insert(preferences.patient_id.clone(), preferences);
    }

    pub async fn insert_appointment(&self, appointment: Appointment) {
        self.appointments
            .write()
            .await
            .entry(appointment.patient_id.clone())
            .or_default()
            .push(appointment);
    }

    pub async fn insert_campaign(&self, campaign: Campaign) {
        self.campaigns
            .write()
            .await
            .insert(campaign.campaign_id.clone(), campaign);
    }

    /// Append a log without counting it as a write attempt
    pub async fn insert_log(&self, log: OutreachLog) {
        self.logs.write().await.push(log);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub async fn all_logs(&self) -> Vec<OutreachLog> {
        self.logs.read().await.clone()
    }

    pub async fn all_states(&self) -> Vec<PatientSequenceState> {
        self.states.read().await.values().cloned().collect()
    }

    pub async fn tenant(&self, tenant_id: &TenantId) -> Option<Tenant> {
        self.tenants.read().await.get(tenant_id).cloned()
    }

    pub fn log_write_attempts(&self) -> u32 {
        self.log_write_attempts.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Make the next `count` log writes fail
    pub fn fail_next_log_writes(&self, count: u32) {
        self.pending_log_write_failures.store(count, Ordering::SeqCst);
    }

    /// Make log lookups for this patient fail until cleared
    pub fn fail_lookups_for(&self, patient_id: &PatientId) {
        self.failing_patients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(patient_id.clone());
    }

    pub fn clear_faults(&self) {
        self.pending_log_write_failures.store(0, Ordering::SeqCst);
        self.failing_patients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn check_lookup(&self, patient_id: &PatientId) -> StoreResult<()> {
        let failing = self
            .failing_patients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(patient_id);
        if failing {
            return Err(StoreError::database(format!(
                "injected lookup failure for patient {}",
                patient_id
            )));
        }
        Ok(())
    }

    fn take_write_failure(&self) -> bool {
        self.pending_log_write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn get(&self, tenant_id: &TenantId) -> StoreResult<Option<Tenant>> {
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }

    async fn list_active(&self) -> StoreResult<Vec<Tenant>> {
        let tenants = self.tenants.read().await;
        let mut active: Vec<Tenant> = tenants.values().filter(|t| t.is_active).cloned().collect();
        active.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(active)
    }

    async fn record_message_sent(&self, tenant_id: &TenantId) -> StoreResult<u32> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::not_found("tenant", tenant_id.as_str()))?;
        tenant.usage.messages_sent_this_period =
            tenant.usage.messages_sent_this_period.saturating_add(1);
        Ok(tenant.usage.messages_sent_this_period)
    }

    async fn reset_usage_counters(&self, period_start: DateTime<Utc>) -> StoreResult<usize> {
        let mut tenants = self.tenants.write().await;
        for tenant in tenants.values_mut() {
            tenant.usage.messages_sent_this_period = 0;
            tenant.usage.period_started_at = period_start;
            tenant.updated_at = period_start;
        }
        Ok(tenants.len())
    }
}

#[async_trait]
impl PatientRepository for InMemoryStore {
    async fn get(&self, patient_id: &PatientId) -> StoreResult<Option<Patient>> {
        Ok(self.patients.read().await.get(patient_id).cloned())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Patient>> {
        let patients = self.patients.read().await;
        let mut list: Vec<Patient> = patients
            .values()
            .filter(|p| &p.tenant_id == tenant_id && p.is_active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        Ok(list)
    }

    async fn get_preferences(
        &self,
        patient_id: &PatientId,
    ) -> StoreResult<Option<PatientPreferences>> {
        Ok(self.preferences.read().await.get(patient_id).cloned())
    }

    async fn get_primary_insurance(&self, patient_id: &PatientId) -> StoreResult<Option<Insurance>> {
        let insurance = self.insurance.read().await;
        Ok(insurance.get(patient_id).and_then(|rows| {
            rows.iter()
                .find(|i| i.is_active && i.is_primary)
                .cloned()
        }))
    }

    async fn has_appointment_booked_since(
        &self,
        patient_id: &PatientId,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .get(patient_id)
            .map(|rows| rows.iter().any(|a| a.booked_since(since, now)))
            .unwrap_or(false))
    }
}

#[async_trait]
impl CampaignRepository for InMemoryStore {
    async fn get(&self, campaign_id: &CampaignId) -> StoreResult<Option<Campaign>> {
        Ok(self.campaigns.read().await.get(campaign_id).cloned())
    }

    async fn list_active_for_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Campaign>> {
        let campaigns = self.campaigns.read().await;
        let mut list: Vec<Campaign> = campaigns
            .values()
            .filter(|c| &c.tenant_id == tenant_id && c.is_active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.campaign_id.cmp(&b.campaign_id)));
        Ok(list)
    }
}

#[async_trait]
impl OutreachLogRepository for InMemoryStore {
    async fn create(&self, log: OutreachLog) -> StoreResult<OutreachLog> {
        self.log_write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_write_failure() {
            return Err(StoreError::database("injected log write failure"));
        }
        self.logs.write().await.push(log.clone());
        Ok(log)
    }

    async fn has_log_since(
        &self,
        patient_id: &PatientId,
        campaign_id: &CampaignId,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check_lookup(patient_id)?;
        let logs = self.logs.read().await;
        Ok(logs.iter().any(|l| {
            &l.patient_id == patient_id && &l.campaign_id == campaign_id && l.created_at >= since
        }))
    }

    async fn has_response_since(
        &self,
        patient_id: &PatientId,
        campaign_id: &CampaignId,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check_lookup(patient_id)?;
        let logs = self.logs.read().await;
        Ok(logs.iter().any(|l| {
            &l.patient_id == patient_id
                && &l.campaign_id == campaign_id
                && l.status == OutreachStatus::Responded
                && l.created_at > since
        }))
    }
}

#[async_trait]
impl SequenceStateRepository for InMemoryStore {
    async fn create(&self, state: PatientSequenceState) -> StoreResult<PatientSequenceState> {
        let mut states = self.states.write().await;
        let exists = states
            .values()
            .any(|s| s.campaign_id == state.campaign_id && s.patient_id == state.patient_id);
        if exists {
            return Err(StoreError::duplicate(
                "sequence_state",
                format!("{}/{}", state.campaign_id, state.patient_id),
            ));
        }
        states.insert(state.state_id.clone(), state.clone());
        Ok(state)
    }

    async fn get(
        &self,
        campaign_id: &CampaignId,
        patient_id: &PatientId,
    ) -> StoreResult<Option<PatientSequenceState>> {
        let states = self.states.read().await;
        Ok(states
            .values()
            .find(|s| &s.campaign_id == campaign_id && &s.patient_id == patient_id)
            .cloned())
    }

    async fn find_due(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PatientSequenceState>> {
        let states = self.states.read().await;
        let mut due: Vec<PatientSequenceState> = states
            .values()
            .filter(|s| &s.tenant_id == tenant_id && s.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.next_scheduled_at
                .cmp(&b.next_scheduled_at)
                .then(a.state_id.cmp(&b.state_id))
        });
        Ok(due)
    }

    async fn try_claim(
        &self,
        state_id: &SequenceStateId,
        expected_next: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(state_id) else {
            return Err(StoreError::not_found("sequence_state", state_id.as_str()));
        };
        if state.is_terminal() || state.next_scheduled_at != Some(expected_next) {
            return Ok(false);
        }
        state.next_scheduled_at = Some(lease_until);
        Ok(true)
    }

    async fn update(&self, state: PatientSequenceState) -> StoreResult<PatientSequenceState> {
        let mut states = self.states.write().await;
        let Some(existing) = states.get_mut(&state.state_id) else {
            return Err(StoreError::not_found("sequence_state", state.state_id.as_str()));
        };
        if existing.is_terminal() {
            return Err(StoreError::invalid_state(format!(
                "sequence state {} is already {}",
                existing.state_id, existing.status
            )));
        }
        *existing = state.clone();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use recall_core::{MessagingProvider, SequenceStatus, StopReason};

    fn state(campaign: &str, patient: &str, next: DateTime<Utc>) -> PatientSequenceState {
        PatientSequenceState::enroll(
            TenantId::new("tenant:1"),
            CampaignId::new(campaign),
            PatientId::new(patient),
            next,
            next,
        )
    }

    fn log(patient: &str, status: OutreachStatus, at: DateTime<Utc>) -> OutreachLog {
        OutreachLog {
            log_id: recall_core::LogId::generate(),
            tenant_id: TenantId::new("tenant:1"),
            campaign_id: CampaignId::new("campaign:1"),
            patient_id: PatientId::new(patient),
            step_id: None,
            step_number: None,
            message_type: recall_core::Channel::Sms,
            message_content: "hello".to_string(),
            recipient: "+15555550100".to_string(),
            status,
            external_id: Some("SM123".to_string()),
            messaging_provider: Some(MessagingProvider::System),
            error_message: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_rejected() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        SequenceStateRepository::create(&store, state("campaign:1", "patient:1", now)).await.unwrap();
        let err = SequenceStateRepository::create(&store, state("campaign:1", "patient:1", now))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        // Different campaign is fine
        SequenceStateRepository::create(&store, state("campaign:2", "patient:1", now)).await.unwrap();
        assert_eq!(store.all_states().await.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_is_conditional() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let s = SequenceStateRepository::create(&store, state("campaign:1", "patient:1", now)).await.unwrap();
        let lease = now + Duration::minutes(10);

        assert!(store.try_claim(&s.state_id, now, lease).await.unwrap());
        // Second claimant read the old schedule
        assert!(!store.try_claim(&s.state_id, now, lease).await.unwrap());
        assert!(store.find_due(&s.tenant_id, now).await.unwrap().is_empty());
        assert_eq!(store.find_due(&s.tenant_id, lease).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_state_not_due_and_not_reactivated() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut s = SequenceStateRepository::create(&store, state("campaign:1", "patient:1", now)).await.unwrap();

        s.stop(StopReason::OptedOut, now).unwrap();
        store.update(s.clone()).await.unwrap();
        assert!(store
            .find_due(&s.tenant_id, now + Duration::days(30))
            .await
            .unwrap()
            .is_empty());

        let mut revived = s.clone();
        revived.status = SequenceStatus::Active;
        revived.next_scheduled_at = Some(now);
        assert!(store.update(revived).await.is_err());
        assert!(!store.try_claim(&s.state_id, now, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_log_queries() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let patient = PatientId::new("patient:1");
        let campaign = CampaignId::new("campaign:1");

        store.insert_log(log("patient:1", OutreachStatus::Sent, now - Duration::days(3))).await;
        assert!(store
            .has_log_since(&patient, &campaign, now - Duration::days(7))
            .await
            .unwrap());
        assert!(!store.has_log_since(&patient, &campaign, now).await.unwrap());
        assert!(!store
            .has_response_since(&patient, &campaign, now - Duration::days(7))
            .await
            .unwrap());

        store
            .insert_log(log("patient:1", OutreachStatus::Responded, now - Duration::days(1)))
            .await;
        assert!(store
            .has_response_since(&patient, &campaign, now - Duration::days(2))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        store.fail_next_log_writes(1);
        assert!(OutreachLogRepository::create(&store, log("patient:1", OutreachStatus::Sent, now)).await.is_err());
        assert!(OutreachLogRepository::create(&store, log("patient:1", OutreachStatus::Sent, now)).await.is_ok());
        assert_eq!(store.log_write_attempts(), 2);
        assert_eq!(store.all_logs().await.len(), 1);

        let patient = PatientId::new("patient:2");
        store.fail_lookups_for(&patient);
        assert!(store
            .has_log_since(&patient, &CampaignId::new("campaign:1"), now)
            .await
            .is_err());
        store.clear_faults();
        assert!(store
            .has_log_since(&patient, &CampaignId::new("campaign:1"), now)
            .await
            .is_ok());
    }
}
