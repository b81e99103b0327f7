//! Outreach and scheduler configuration
//!
//! Loaded from environment variables with the `RECALL_` prefix.

use recall_core::{
    DEFAULT_CLAIM_LEASE_SECS, DEFAULT_COOLDOWN_DAYS, DEFAULT_EMAIL_SUBJECT,
    LOG_WRITE_INITIAL_BACKOFF_MS, LOG_WRITE_MAX_ATTEMPTS, SEQUENCE_TICK_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};
use std::env;

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

/// Outreach engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// Minimum days between single-shot sends to the same patient
    pub cooldown_days: i64,
    pub log_write_max_attempts: u32,
    pub log_write_initial_backoff_ms: u64,
    /// How far a claimed sequence state is pushed out while in flight
    pub claim_lease_secs: i64,
    /// Used when a campaign or step has no subject
    pub default_email_subject: String,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
            log_write_max_attempts: LOG_WRITE_MAX_ATTEMPTS,
            log_write_initial_backoff_ms: LOG_WRITE_INITIAL_BACKOFF_MS,
            claim_lease_secs: DEFAULT_CLAIM_LEASE_SECS,
            default_email_subject: DEFAULT_EMAIL_SUBJECT.to_string(),
        }
    }
}

impl OutreachConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cooldown_days: parse_env("RECALL_COOLDOWN_DAYS").unwrap_or(defaults.cooldown_days),
            log_write_max_attempts: parse_env("RECALL_LOG_WRITE_MAX_ATTEMPTS")
                .unwrap_or(defaults.log_write_max_attempts),
            log_write_initial_backoff_ms: parse_env("RECALL_LOG_WRITE_BACKOFF_MS")
                .unwrap_or(defaults.log_write_initial_backoff_ms),
            claim_lease_secs: parse_env("RECALL_CLAIM_LEASE_SECS")
                .unwrap_or(defaults.claim_lease_secs),
            default_email_subject: env::var("RECALL_DEFAULT_EMAIL_SUBJECT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_email_subject),
        }
    }
}

/// Cron-style scheduler configuration (all times UTC)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Hour of the daily single-shot run
    pub automated_outreach_hour: u32,
    /// Hour of the daily benefits snapshot
    pub benefits_snapshot_hour: u32,
    pub sequence_interval_secs: u64,
    /// Day of month on which usage counters reset
    pub usage_reset_day: u32,
    /// How often the loop checks whether a daily or monthly job is due
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            automated_outreach_hour: 9,
            benefits_snapshot_hour: 2,
            sequence_interval_secs: SEQUENCE_TICK_INTERVAL_SECS,
            usage_reset_day: 1,
            poll_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: flag_env("RECALL_SCHEDULER_ENABLED").unwrap_or(defaults.enabled),
            automated_outreach_hour: parse_env::<u32>("RECALL_OUTREACH_HOUR")
                .filter(|h| *h < 24)
                .unwrap_or(defaults.automated_outreach_hour),
            benefits_snapshot_hour: parse_env::<u32>("RECALL_SNAPSHOT_HOUR")
                .filter(|h| *h < 24)
                .unwrap_or(defaults.benefits_snapshot_hour),
            sequence_interval_secs: parse_env::<u64>("RECALL_SEQUENCE_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.sequence_interval_secs),
            usage_reset_day: defaults.usage_reset_day,
            poll_interval_secs: parse_env::<u64>("RECALL_SCHEDULER_POLL_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.poll_interval_secs),
        }
    }
}
