//! Outreach metrics
//!
//! ## Counters
//! - `recall_outreach_patients_total` - Single-shot patients by outcome
//! - `recall_sequence_transitions_total` - Sequence steps, stops, completions
//! - `recall_usage_limit_rejections_total` - Sends blocked by the monthly limit
//! - `recall_outreach_log_write_failures_total` - Sends whose audit row was lost
//! - `recall_scheduler_runs_total` - Scheduler job runs by job, status
//!
//! ## Histograms
//! - `recall_scheduler_run_duration_seconds` - Scheduler job duration
//!
//! # Configuration
//!
//! - `RECALL_METRICS_ENABLED`: install the Prometheus exporter (default: false)
//! - `RECALL_METRICS_PORT`: exporter port (default: 9090)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use recall_core::{Channel, StopReason};
use std::net::{Ipv4Addr, SocketAddr};

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("RECALL_METRICS_ENABLED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        let port = std::env::var("RECALL_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090);
        Self { enabled, port }
    }
}

/// Install the Prometheus exporter. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), String> {
    if !config.enabled {
        tracing::info!("Metrics disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)))
        .install()
        .map_err(|e| format!("Failed to install metrics recorder: {}", e))?;

    tracing::info!(port = config.port, "Metrics initialized");
    Ok(())
}

pub fn record_patient_outcome(outcome: &'static str) {
    counter!("recall_outreach_patients_total", "outcome" => outcome).increment(1);
}

pub fn record_step_sent(channel: Channel, success: bool) {
    counter!(
        "recall_sequence_transitions_total",
        "transition" => "step",
        "channel" => channel.as_str(),
        "success" => if success { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_step_skipped(channel: Channel) {
    counter!(
        "recall_sequence_transitions_total",
        "transition" => "skipped",
        "channel" => channel.as_str()
    )
    .increment(1);
}

pub fn record_sequence_stopped(reason: StopReason) {
    counter!(
        "recall_sequence_transitions_total",
        "transition" => "stopped",
        "reason" => reason.as_str()
    )
    .increment(1);
}

pub fn record_sequence_completed() {
    counter!("recall_sequence_transitions_total", "transition" => "completed").increment(1);
}

pub fn record_usage_rejection() {
    counter!("recall_usage_limit_rejections_total").increment(1);
}

pub fn record_log_write_failure(channel: Channel) {
    counter!(
        "recall_outreach_log_write_failures_total",
        "channel" => channel.as_str()
    )
    .increment(1);
}

pub fn record_scheduler_run(job: &'static str, ok: bool, duration_secs: f64) {
    let status = if ok { "ok" } else { "error" };
    counter!("recall_scheduler_runs_total", "job" => job, "status" => status).increment(1);
    histogram!("recall_scheduler_run_duration_seconds", "job" => job).record(duration_secs);
}
