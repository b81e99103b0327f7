//! Benefit projection produced by the benefits collaborator

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{Channel, PatientId, TenantId};

/// A patient's remaining coverage and when it lapses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitRecord {
    pub patient_id: PatientId,
    pub tenant_id: TenantId,
    pub patient_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub remaining_benefits: Decimal,
    pub expiration_date: NaiveDate,
    pub days_remaining: i64,
    pub carrier: Option<String>,
}

impl BenefitRecord {
    pub fn first_name(&self) -> &str {
        self.patient_name.split_whitespace().next().unwrap_or("")
    }

    pub fn last_name(&self) -> String {
        self.patient_name
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ")
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
