//! Outreach log writer
//!
//! One row per send attempt, success or failure. A write that keeps failing
//! is retried with exponential backoff and then reported through metrics;
//! it never propagates into the send or advance logic.

use recall_core::{
    CampaignId, Channel, Clock, LogId, OutreachLog, PatientId, SendResult, SequenceStep, TenantId,
};
use recall_store::{OutreachLogRepository, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::OutreachConfig;
use crate::metrics;

const BACKOFF_MULTIPLIER: f64 = 2.0;
const MAX_BACKOFF_MS: u64 = 2_000;

/// What one send attempt looked like
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    pub tenant_id: &'a TenantId,
    pub campaign_id: &'a CampaignId,
    pub patient_id: &'a PatientId,
    pub channel: Channel,
    pub content: &'a str,
    pub recipient: &'a str,
    pub result: &'a SendResult,
    pub step: Option<&'a SequenceStep>,
}

pub struct OutreachLogWriter {
    logs: Arc<dyn OutreachLogRepository>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    initial_backoff_ms: u64,
}

impl OutreachLogWriter {
    pub fn new(
        logs: Arc<dyn OutreachLogRepository>,
        clock: Arc<dyn Clock>,
        config: &OutreachConfig,
    ) -> Self {
        Self {
            logs,
            clock,
            max_attempts: config.log_write_max_attempts.max(1),
            initial_backoff_ms: config.log_write_initial_backoff_ms,
        }
    }

    /// Build the row for an attempt
    pub fn build_row(&self, entry: &LogEntry<'_>) -> OutreachLog {
        let now = self.clock.now();
        OutreachLog {
            log_id: LogId::generate(),
            tenant_id: entry.tenant_id.clone(),
            campaign_id: entry.campaign_id.clone(),
            patient_id: entry.patient_id.clone(),
            step_id: entry.step.map(|s| s.step_id.clone()),
            step_number: entry.step.map(|s| s.step_number),
            message_type: entry.channel,
            message_content: entry.content.to_string(),
            recipient: entry.recipient.to_string(),
            status: entry.result.log_status(),
            external_id: entry.result.message_id.clone(),
            messaging_provider: Some(entry.result.provider),
            error_message: entry.result.error.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Persist the attempt. Returns `None` when every write attempt failed.
    pub async fn log(&self, entry: LogEntry<'_>) -> Option<OutreachLog> {
        let row = self.build_row(&entry);
        let log_id = row.log_id.clone();

        match self.write_with_retry(row).await {
            Ok(saved) => {
                debug!(
                    log_id = %saved.log_id,
                    patient_id = %saved.patient_id,
                    campaign_id = %saved.campaign_id,
                    status = saved.status.as_str(),
                    "Outreach log written"
                );
                Some(saved)
            }
            Err(e) => {
                metrics::record_log_write_failure(entry.channel);
                error!(
                    log_id = %log_id,
                    tenant_id = %entry.tenant_id,
                    patient_id = %entry.patient_id,
                    campaign_id = %entry.campaign_id,
                    channel = %entry.channel,
                    success = entry.result.success,
                    external_id = entry.result.message_id.as_deref().unwrap_or(""),
                    error = %e,
                    "Outreach log lost after retries"
                );
                None
            }
        }
    }

    async fn write_with_retry(&self, row: OutreachLog) -> StoreResult<OutreachLog> {
        let mut backoff_ms = self.initial_backoff_ms;
        let mut attempt = 1;

        loop {
            match self.logs.create(row.clone()).await {
                Ok(saved) => return Ok(saved),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        log_id = %row.log_id,
                        attempt,
                        error = %e,
                        "Outreach log write failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = std::cmp::min(
                        (backoff_ms as f64 * BACKOFF_MULTIPLIER) as u64,
                        MAX_BACKOFF_MS,
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use recall_core::{ManualClock, MessagingProvider, OutreachStatus};
    use recall_store::InMemoryStore;

    fn writer(store: Arc<InMemoryStore>) -> OutreachLogWriter {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap(),
        ));
        let config = OutreachConfig {
            log_write_initial_backoff_ms: 1,
            ..OutreachConfig::default()
        };
        OutreachLogWriter::new(store, clock, &config)
    }

    #[tokio::test]
    async fn test_log_records_provider_correlation() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let result = SendResult::accepted(Some("SG-abc".to_string()), MessagingProvider::CustomSendgrid);

        let saved = writer
            .log(LogEntry {
                tenant_id: &TenantId::new("t1"),
                campaign_id: &CampaignId::new("c1"),
                patient_id: &PatientId::new("p1"),
                channel: Channel::Email,
                content: "Hi Jane",
                recipient: "jane@example.com",
                result: &result,
                step: None,
            })
            .await
            .unwrap();

        assert_eq!(saved.status, OutreachStatus::Sent);
        assert_eq!(saved.external_id.as_deref(), Some("SG-abc"));
        assert_eq!(saved.messaging_provider, Some(MessagingProvider::CustomSendgrid));
        assert_eq!(store.all_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_without_provider_id_leaves_external_id_empty() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let result = SendResult::accepted(None, MessagingProvider::System);

        let saved = writer
            .log(LogEntry {
                tenant_id: &TenantId::new("t1"),
                campaign_id: &CampaignId::new("c1"),
                patient_id: &PatientId::new("p1"),
                channel: Channel::Email,
                content: "Hi Jane",
                recipient: "jane@example.com",
                result: &result,
                step: None,
            })
            .await
            .unwrap();

        assert_eq!(saved.status, OutreachStatus::Sent);
        assert!(saved.external_id.is_none());
    }

    #[tokio::test]
    async fn test_failed_send_is_logged_with_error() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let result = SendResult::failed("invalid number", MessagingProvider::System);

        let saved = writer
            .log(LogEntry {
                tenant_id: &TenantId::new("t1"),
                campaign_id: &CampaignId::new("c1"),
                patient_id: &PatientId::new("p1"),
                channel: Channel::Sms,
                content: "Hi",
                recipient: "+15555550100",
                result: &result,
                step: None,
            })
            .await
            .unwrap();

        assert_eq!(saved.status, OutreachStatus::Failed);
        assert_eq!(saved.error_message.as_deref(), Some("invalid number"));
        assert!(saved.external_id.is_none());
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_retried() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        store.fail_next_log_writes(2);
        let result = SendResult::accepted(Some("SM1".to_string()), MessagingProvider::System);

        let saved = writer
            .log(LogEntry {
                tenant_id: &TenantId::new("t1"),
                campaign_id: &CampaignId::new("c1"),
                patient_id: &PatientId::new("p1"),
                channel: Channel::Sms,
                content: "Hi",
                recipient: "+15555550100",
                result: &result,
                step: None,
            })
            .await;

        assert!(saved.is_some());
        assert_eq!(store.log_write_attempts(), 3);
        assert_eq!(store.all_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_write_failure_returns_none() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        store.fail_next_log_writes(10);
        let result = SendResult::accepted(Some("SM1".to_string()), MessagingProvider::System);

        let saved = writer
            .log(LogEntry {
                tenant_id: &TenantId::new("t1"),
                campaign_id: &CampaignId::new("c1"),
                patient_id: &PatientId::new("p1"),
                channel: Channel::Sms,
                content: "Hi",
                recipient: "+15555550100",
                result: &result,
                step: None,
            })
            .await;

        assert!(saved.is_none());
        assert_eq!(store.log_write_attempts(), 3);
        assert!(store.all_logs().await.is_empty());
    }
}
