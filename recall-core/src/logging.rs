//! Logging conventions and subscriber setup
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Audit gaps, broken invariants | Log write exhausted retries |
//! | WARN  | Degraded operation | Custom provider fell back to system, send failed |
//! | INFO  | State changes | Sequence stopped/completed, tick summary |
//! | DEBUG | Per-patient flow | Cooldown skip, channel opt-out skip |
//! | TRACE | Payloads | Rendered message bodies |
//!
//! # Structured Fields
//!
//! Events share field names so log queries work across crates: `tenant_id`,
//! `patient_id`, `campaign_id`, `state_id`, `step_number`, `channel`,
//! `provider`, `message_id`, `stop_reason`, `error`, `attempt`.
//!
//! ```ignore
//! use tracing::warn;
//!
//! warn!(
//!     tenant_id = %tenant_id,
//!     patient_id = %patient_id,
//!     channel = %channel,
//!     error = %e,
//!     "Send failed"
//! );
//! ```
//!
//! Never log decrypted credentials or full message bodies above TRACE.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Lenient parse used by env configuration
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub include_source: bool,
    pub include_span_events: bool,
    /// Full `EnvFilter` directive; overrides `level` when set
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_source: true,
            include_span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            include_source: false,
            include_span_events: true,
            filter: None,
        }
    }

    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            ..Self::default()
        }
    }

    /// Read `RECALL_LOG_LEVEL`, `RECALL_LOG_FORMAT` and `RUST_LOG`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = std::env::var("RECALL_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
        {
            config.level = level;
        }
        if let Ok(format) = std::env::var("RECALL_LOG_FORMAT") {
            config.format = match format.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        config.filter = std::env::var("RUST_LOG").ok().filter(|f| !f.is_empty());
        config
    }

    fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!(
                "recall_core={lvl},recall_store={lvl},recall_messaging={lvl},recall_outreach={lvl}",
                lvl = self.level
            ),
        }
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(config.directive())?;

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_span_events(span_events)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_span_events(span_events)
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
