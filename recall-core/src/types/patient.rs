//! Patients and the records consulted before outreach

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{Channel, PatientId, TenantId};

/// Patient belonging to exactly one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Address for the given channel, ignoring blanks
    pub fn contact_for(&self, channel: Channel) -> Option<&str> {
        let value = match channel {
            Channel::Sms => self.phone.as_deref(),
            Channel::Email => self.email.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Insurance coverage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insurance {
    pub insurance_id: String,
    pub patient_id: PatientId,
    pub carrier_name: Option<String>,
    pub is_primary: bool,
    pub is_active: bool,
    pub annual_maximum: Decimal,
    pub used_benefits: Decimal,
    pub remaining_benefits: Decimal,
    pub expiration_date: NaiveDate,
}

impl Insurance {
    /// Coverage ended before `today`
    pub fn has_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }
}

/// Per-patient opt-out flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientPreferences {
    pub patient_id: PatientId,
    pub email_opt_out: bool,
    pub sms_opt_out: bool,
    pub updated_at: DateTime<Utc>,
}

impl PatientPreferences {
    pub fn is_opted_out(&self, channel: Channel) -> bool {
        match channel {
            Channel::Sms => self.sms_opt_out,
            Channel::Email => self.email_opt_out,
        }
    }

    /// Opted out of every channel
    pub fn fully_opted_out(&self) -> bool {
        self.email_opt_out && self.sms_opt_out
    }
}

/// Appointment status as synced from the practice-management system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

/// Appointment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: String,
    pub patient_id: PatientId,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// A future scheduled appointment that was booked after `since`
    pub fn booked_since(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Scheduled
            && self.appointment_date > now
            && self.created_at > since
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn appointment(status: AppointmentStatus, date_offset_days: i64, created_offset_days: i64) -> Appointment {
        let now = Utc::now();
        Appointment {
            appointment_id: "appt:1".to_string(),
            patient_id: PatientId::new("patient:1"),
            appointment_date: now + Duration::days(date_offset_days),
            status,
            created_at: now + Duration::days(created_offset_days),
        }
    }

    #[test]
    fn test_booked_since_requires_all_conditions() {
        let now = Utc::now();
        let started = now - Duration::days(5);

        assert!(appointment(AppointmentStatus::Scheduled, 3, -1).booked_since(started, now));
        // Created before the sequence started
        assert!(!appointment(AppointmentStatus::Scheduled, 3, -10).booked_since(started, now));
        // In the past
        assert!(!appointment(AppointmentStatus::Scheduled, -1, -1).booked_since(started, now));
        // Cancelled
        assert!(!appointment(AppointmentStatus::Cancelled, 3, -1).booked_since(started, now));
    }

    #[test]
    fn test_contact_for_ignores_blank() {
        let patient = Patient {
            patient_id: PatientId::new("patient:1"),
            tenant_id: TenantId::new("tenant:1"),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: Some("  ".to_string()),
            phone: Some("+15555550100".to_string()),
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(patient.contact_for(Channel::Email), None);
        assert_eq!(patient.contact_for(Channel::Sms), Some("+15555550100"));
        assert_eq!(patient.full_name(), "Jane Doe");
    }
}
