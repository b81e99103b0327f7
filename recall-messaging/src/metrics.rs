//! Messaging metrics
//!
//! ## Counters
//! - `recall_messages_total` - Send attempts by channel, provider, outcome
//! - `recall_credential_cache_total` - Cache lookups by channel, result
//! - `recall_provider_fallback_total` - Custom provider fell back to system

use metrics::counter;
use recall_core::{Channel, MessagingProvider};

/// Outcome label for a send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed,
    Simulated,
}

impl SendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendOutcome::Sent => "sent",
            SendOutcome::Failed => "failed",
            SendOutcome::Simulated => "simulated",
        }
    }
}

pub fn record_send(channel: Channel, provider: MessagingProvider, outcome: SendOutcome) {
    counter!(
        "recall_messages_total",
        "channel" => channel.as_str(),
        "provider" => provider.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_cache_lookup(channel: Channel, hit: bool) {
    counter!(
        "recall_credential_cache_total",
        "channel" => channel.as_str(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_fallback(channel: Channel) {
    counter!("recall_provider_fallback_total", "channel" => channel.as_str()).increment(1);
}
