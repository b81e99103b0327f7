//! Outreach log rows and send outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{CampaignId, Channel, LogId, MessagingProvider, PatientId, StepId, TenantId};

/// Delivery status of one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Responded,
}

impl OutreachStatus {
    /// Terminal rows are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutreachStatus::Delivered | OutreachStatus::Failed | OutreachStatus::Responded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutreachStatus::Pending => "pending",
            OutreachStatus::Sent => "sent",
            OutreachStatus::Delivered => "delivered",
            OutreachStatus::Failed => "failed",
            OutreachStatus::Responded => "responded",
        }
    }
}

/// Audit record of one send attempt
///
/// `external_id` and `messaging_provider` let the webhook ingester correlate
/// delivery callbacks back to this row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachLog {
    pub log_id: LogId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub patient_id: PatientId,
    pub step_id: Option<StepId>,
    pub step_number: Option<u32>,
    pub message_type: Channel,
    pub message_content: String,
    pub recipient: String,
    pub status: OutreachStatus,
    pub external_id: Option<String>,
    pub messaging_provider: Option<MessagingProvider>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized outcome of one channel send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub provider: MessagingProvider,
    /// No provider was configured and the send was only simulated
    #[serde(default)]
    pub simulated: bool,
}

impl SendResult {
    /// Accepted by a real provider; `message_id` is whatever id the provider returned
    pub fn accepted(message_id: Option<String>, provider: MessagingProvider) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
            provider,
            simulated: false,
        }
    }

    /// Development-mode success with a synthetic id
    pub fn simulated(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            provider: MessagingProvider::System,
            simulated: true,
        }
    }

    pub fn failed(error: impl Into<String>, provider: MessagingProvider) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            provider,
            simulated: false,
        }
    }

    /// Status recorded on the outreach log row
    pub fn log_status(&self) -> OutreachStatus {
        if self.success {
            OutreachStatus::Sent
        } else {
            OutreachStatus::Failed
        }
    }
}
