//! Recall Outreach - Benefit Expiry Outreach Engine
//!
//! Orchestrates outreach for every practice (tenant):
//! - Single-shot campaigns: a daily sweep with a per-patient cooldown
//! - Sequence campaigns: enrollment plus a periodic tick that stops,
//!   completes or advances each due enrollment
//! - Manual "send now" for one patient
//! - A cron-style scheduler driving all of the above
//!
//! Every send attempt is logged with the provider message id so delivery
//! webhooks can be correlated later. Sends never raise past a batch loop;
//! failures become failed results and counters.
//!
//! # Usage Example
//!
//! ```ignore
//! use recall_outreach::OutreachService;
//! use recall_store::{InMemoryStore, Repositories, RepositoryBenefitsEngine};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let repos = Repositories::in_memory(store);
//! let benefits = Arc::new(RepositoryBenefitsEngine::new(repos.patients.clone(), clock));
//! let service = OutreachService::from_env(repos, benefits);
//!
//! let summary = service.process_automated_outreach(&tenant_id).await?;
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod log_writer;
pub mod metrics;
pub mod processor;
pub mod scheduler;
pub mod sequence;
pub mod service;
pub mod tick_lock;

pub use config::{OutreachConfig, SchedulerConfig};
pub use delivery::{Delivery, DeliveryPipeline, USAGE_LIMIT_REACHED};
pub use error::{OutreachError, OutreachResult};
pub use log_writer::{LogEntry, OutreachLogWriter};
pub use metrics::{init_metrics, MetricsConfig};
pub use processor::{OutreachProcessor, OutreachSummary};
pub use scheduler::{next_daily_run, next_monthly_run, JobReport, OutreachScheduler, SchedulerHandle};
pub use sequence::{EnrollmentSummary, SequenceEngine, SequenceSummary};
pub use service::OutreachService;
pub use tick_lock::TenantLocks;
