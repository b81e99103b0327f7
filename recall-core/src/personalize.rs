//! Message personalization
//!
//! Substitutes `{placeholder}` tokens in a campaign template with values
//! derived from a [`BenefitRecord`]. Pure: no clock, no I/O, and unknown
//! placeholders are copied through untouched.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::BenefitRecord;

/// Shown for `{carrier}` when the insurance row has no carrier name
pub const UNKNOWN_CARRIER: &str = "your insurance";

/// Whole-currency amount, e.g. `482.7` -> `$483`
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${}", rounded.abs())
    } else {
        format!("${}", rounded.abs())
    }
}

/// Locale-independent `MM/DD/YYYY`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

fn resolve(name: &str, benefit: &BenefitRecord) -> Option<String> {
    let value = match name {
        "firstName" => benefit.first_name().to_string(),
        "lastName" => benefit.last_name(),
        "fullName" => benefit.patient_name.trim().to_string(),
        "amount" => format_amount(benefit.remaining_benefits),
        "expirationDate" => format_date(benefit.expiration_date),
        "daysRemaining" => benefit.days_remaining.to_string(),
        "carrier" => benefit
            .carrier
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_CARRIER)
            .to_string(),
        _ => return None,
    };
    Some(value)
}

/// Render `template` for one patient.
///
/// Substituted values are never rescanned, so a patient name containing
/// braces cannot expand into another placeholder.
pub fn personalize(template: &str, benefit: &BenefitRecord) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find(|c| c == '}' || c == '{') {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let name = &after[..close];
                match resolve(name, benefit) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                // Lone or nested brace: emit it and keep scanning
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatientId, TenantId};
    use std::str::FromStr;

    fn jane() -> BenefitRecord {
        BenefitRecord {
            patient_id: PatientId::new("patient:jane"),
            tenant_id: TenantId::new("tenant:smile"),
            patient_name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
            phone: Some("+15555550100".to_string()),
            remaining_benefits: Decimal::from_str("482.7").unwrap(),
            expiration_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            days_remaining: 45,
            carrier: Some("Delta Dental".to_string()),
        }
    }

    #[test]
    fn test_reference_template() {
        let msg = personalize("Hi {firstName}, {amount} expires {expirationDate}", &jane());
        assert_eq!(msg, "Hi Jane, $483 expires 12/31/2025");
    }

    #[test]
    fn test_deterministic() {
        let template = "{fullName}: {amount} with {carrier}, {daysRemaining} days left";
        let b = jane();
        assert_eq!(personalize(template, &b), personalize(template, &b));
        assert_eq!(
            personalize(template, &b),
            "Jane Doe: $483 with Delta Dental, 45 days left"
        );
    }

    #[test]
    fn test_unknown_placeholders_verbatim() {
        let msg = personalize("Dear {title} {lastName}, call {officePhone}", &jane());
        assert_eq!(msg, "Dear {title} Doe, call {officePhone}");
    }

    #[test]
    fn test_unbalanced_braces() {
        let b = jane();
        assert_eq!(personalize("{firstName", &b), "{firstName");
        assert_eq!(personalize("{{firstName}}", &b), "{Jane}");
        assert_eq!(personalize("}{}", &b), "}{}");
    }

    #[test]
    fn test_multi_word_last_name() {
        let mut b = jane();
        b.patient_name = "Mary  Anne de la Cruz".to_string();
        assert_eq!(personalize("{firstName}|{lastName}", &b), "Mary|Anne de la Cruz");

        b.patient_name = "Cher".to_string();
        assert_eq!(personalize("{firstName}|{lastName}", &b), "Cher|");
    }

    #[test]
    fn test_values_not_rescanned() {
        let mut b = jane();
        b.patient_name = "{amount} Doe".to_string();
        assert_eq!(personalize("{firstName}", &b), "{amount}");
    }

    #[test]
    fn test_missing_carrier() {
        let mut b = jane();
        b.carrier = None;
        assert_eq!(personalize("{carrier}", &b), UNKNOWN_CARRIER);
    }

    #[test]
    fn test_format_amount_rounding() {
        assert_eq!(format_amount(Decimal::from_str("482.5").unwrap()), "$483");
        assert_eq!(format_amount(Decimal::from_str("482.49").unwrap()), "$482");
        assert_eq!(format_amount(Decimal::from_str("1500.00").unwrap()), "$1500");
        assert_eq!(format_amount(Decimal::ZERO), "$0");
    }
}
