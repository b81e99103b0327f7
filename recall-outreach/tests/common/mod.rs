#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use recall_core::{
    Appointment, AppointmentStatus, Campaign, CampaignId, DelayType, Insurance, LogId,
    ManualClock, MessageType, MessagingProvider, OutreachLog, OutreachStatus, Patient, PatientId,
    PatientPreferences, SequenceStep, StepId, Tenant, TenantId, TriggerType, Channel,
};
use recall_messaging::{MessagingConfig, MockClientFactory, MockEmailClient, MockSmsClient};
use recall_outreach::{OutreachConfig, OutreachService};
use recall_store::{InMemoryStore, Repositories, RepositoryBenefitsEngine};
use rust_decimal::Decimal;
use std::sync::Arc;

pub const SYSTEM_SID: &str = "ACsystem";
pub const SYSTEM_PHONE: &str = "+15550000000";
pub const SYSTEM_FROM_EMAIL: &str = "reminders@platform.example";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub factory: Arc<MockClientFactory>,
    pub benefits: Arc<RepositoryBenefitsEngine>,
    pub service: Arc<OutreachService>,
    pub tenant_id: TenantId,
}

impl Harness {
    /// Tenant on system providers, both of which are configured
    pub async fn new() -> Self {
        let messaging = MessagingConfig::default()
            .with_system_twilio(SYSTEM_SID, "system-token", SYSTEM_PHONE)
            .with_system_sendgrid("SG.system-key-0123456789", SYSTEM_FROM_EMAIL, "Reminders");
        Self::with_messaging(messaging).await
    }

    /// No system provider configured anywhere
    pub async fn without_providers() -> Self {
        Self::with_messaging(MessagingConfig::default()).await
    }

    async fn with_messaging(messaging: MessagingConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let factory = Arc::new(MockClientFactory::new());
        let repos = Repositories::in_memory(store.clone());
        let benefits = Arc::new(RepositoryBenefitsEngine::new(
            repos.patients.clone(),
            clock.clone(),
        ));
        let config = OutreachConfig {
            log_write_initial_backoff_ms: 1,
            ..OutreachConfig::default()
        };
        let service = Arc::new(OutreachService::new(
            repos,
            benefits.clone(),
            factory.clone(),
            Arc::new(messaging),
            config,
            clock.clone(),
        ));

        let tenant_id = TenantId::new("tenant:smile");
        store
            .insert_tenant(Tenant::new(tenant_id.clone(), "Smile Dental", start_time()))
            .await;

        Self {
            store,
            clock,
            factory,
            benefits,
            service,
            tenant_id,
        }
    }

    /// A second service over the same store, with its own locks and cache
    pub fn sibling_service(&self, messaging: MessagingConfig) -> OutreachService {
        let repos = Repositories::in_memory(self.store.clone());
        OutreachService::new(
            repos,
            self.benefits.clone(),
            self.factory.clone(),
            Arc::new(messaging),
            OutreachConfig::default(),
            self.clock.clone(),
        )
    }

    pub fn sms(&self) -> Arc<MockSmsClient> {
        self.factory
            .sms_mock(SYSTEM_SID, SYSTEM_PHONE, MessagingProvider::System)
    }

    pub fn email(&self) -> Arc<MockEmailClient> {
        self.factory
            .email_mock(SYSTEM_FROM_EMAIL, MessagingProvider::System)
    }

    pub fn now(&self) -> DateTime<Utc> {
        use recall_core::Clock;
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Active patient with phone and email and a primary insurance row
    pub async fn add_patient(&self, id: &str, name: &str, expires_in_days: i64, remaining: i64) -> PatientId {
        let patient_id = self.add_patient_without_insurance(id, name).await;
        self.store
            .insert_insurance(Insurance {
                insurance_id: format!("ins:{}", id),
                patient_id: patient_id.clone(),
                carrier_name: Some("Delta Dental".to_string()),
                is_primary: true,
                is_active: true,
                annual_maximum: Decimal::new(1500, 0),
                used_benefits: Decimal::new(1500 - remaining, 0),
                remaining_benefits: Decimal::new(remaining, 0),
                expiration_date: self.today() + Duration::days(expires_in_days),
            })
            .await;
        patient_id
    }

    pub async fn add_patient_without_insurance(&self, id: &str, name: &str) -> PatientId {
        let patient_id = PatientId::new(id);
        let mut parts = name.splitn(2, ' ');
        self.store
            .insert_patient(Patient {
                patient_id: patient_id.clone(),
                tenant_id: self.tenant_id.clone(),
                first_name: parts.next().unwrap_or_default().to_string(),
                last_name: parts.next().unwrap_or_default().to_string(),
                email: Some(format!("{}@example.com", id.replace(':', "-"))),
                phone: Some(phone_for(id)),
                is_active: true,
                created_at: self.now(),
            })
            .await;
        patient_id
    }

    pub async fn set_opt_outs(&self, patient_id: &PatientId, sms: bool, email: bool) {
        self.store
            .set_preferences(PatientPreferences {
                patient_id: patient_id.clone(),
                email_opt_out: email,
                sms_opt_out: sms,
                updated_at: self.now(),
            })
            .await;
    }

    pub async fn book_appointment(&self, patient_id: &PatientId) {
        self.store
            .insert_appointment(Appointment {
                appointment_id: format!("appt:{}", patient_id),
                patient_id: patient_id.clone(),
                appointment_date: self.now() + Duration::days(7),
                status: AppointmentStatus::Scheduled,
                created_at: self.now(),
            })
            .await;
    }

    /// Log row dated `days_ago` before now
    pub async fn insert_log(
        &self,
        patient_id: &PatientId,
        campaign_id: &CampaignId,
        status: OutreachStatus,
        at: DateTime<Utc>,
    ) {
        self.store
            .insert_log(OutreachLog {
                log_id: LogId::generate(),
                tenant_id: self.tenant_id.clone(),
                campaign_id: campaign_id.clone(),
                patient_id: patient_id.clone(),
                step_id: None,
                step_number: None,
                message_type: Channel::Sms,
                message_content: "earlier".to_string(),
                recipient: phone_for(patient_id.as_str()),
                status,
                external_id: Some("SMearlier".to_string()),
                messaging_provider: Some(MessagingProvider::System),
                error_message: None,
                created_at: at,
                updated_at: at,
            })
            .await;
    }

    pub async fn add_campaign(&self, campaign: Campaign) -> CampaignId {
        let id = campaign.campaign_id.clone();
        self.store.insert_campaign(campaign).await;
        id
    }
}

/// Deterministic E.164 number per patient id
pub fn phone_for(id: &str) -> String {
    let digits: u32 = id.bytes().map(u32::from).sum();
    format!("+1555{:07}", digits)
}

pub fn single_shot(id: &str, tenant_id: &TenantId, message_type: MessageType) -> Campaign {
    Campaign {
        campaign_id: CampaignId::new(id),
        tenant_id: tenant_id.clone(),
        name: "Use it or lose it".to_string(),
        is_active: true,
        is_sequence: false,
        trigger_type: TriggerType::Expiring60,
        message_type,
        message_template: "Hi {firstName}, you have {amount} in benefits expiring {expirationDate}."
            .to_string(),
        email_subject: Some("{firstName}, your benefits expire soon".to_string()),
        min_benefit_amount: Decimal::new(100, 0),
        auto_stop_on_appointment: false,
        auto_stop_on_response: false,
        auto_stop_on_opt_out: false,
        steps: Vec::new(),
        created_at: start_time(),
    }
}

pub fn step(
    campaign_id: &str,
    number: u32,
    message_type: MessageType,
    delay_type: DelayType,
    delay_value: u32,
) -> SequenceStep {
    SequenceStep {
        step_id: StepId::new(format!("{}:step:{}", campaign_id, number)),
        campaign_id: CampaignId::new(campaign_id),
        step_number: number,
        message_type,
        message_template: format!("Step {} for {{firstName}}: {{amount}} left", number),
        email_subject: None,
        delay_type,
        delay_value,
        is_active: true,
    }
}

pub fn sequence(id: &str, tenant_id: &TenantId, steps: Vec<SequenceStep>) -> Campaign {
    Campaign {
        campaign_id: CampaignId::new(id),
        tenant_id: tenant_id.clone(),
        name: "Year-end sequence".to_string(),
        is_active: true,
        is_sequence: true,
        trigger_type: TriggerType::Expiring60,
        message_type: MessageType::Sms,
        message_template: String::new(),
        email_subject: None,
        min_benefit_amount: Decimal::new(100, 0),
        auto_stop_on_appointment: true,
        auto_stop_on_response: true,
        auto_stop_on_opt_out: true,
        steps,
        created_at: start_time(),
    }
}
