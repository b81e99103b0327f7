//! Cron-style background scheduler
//!
//! Four jobs share one spawned loop:
//! - automated single-shot outreach, daily
//! - sequence processing, on a fixed interval
//! - benefits snapshot, daily
//! - usage counter reset, monthly
//!
//! Each job sweeps the active tenants one after another. A tenant that
//! fails is logged and counted; the sweep moves on.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use recall_core::{Clock, TenantId};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::OutreachResult;
use crate::metrics;
use crate::service::OutreachService;

/// Scheduler job identifiers, used as metric labels
pub mod jobs {
    pub const AUTOMATED_OUTREACH: &str = "automated_outreach";
    pub const SEQUENCE_PROCESSING: &str = "sequence_processing";
    pub const BENEFITS_SNAPSHOT: &str = "benefits_snapshot";
    pub const USAGE_RESET: &str = "usage_reset";
}

/// Next instant strictly after `after` that falls on `hour:00` UTC
pub fn next_daily_run(after: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = after.date_naive().and_time(time).and_utc();
    if today > after {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Next midnight UTC strictly after `after` on day `day` of a month.
/// Days past 28 are clamped so every month has a run.
pub fn next_monthly_run(after: DateTime<Utc>, day: u32) -> DateTime<Utc> {
    let day = day.clamp(1, 28);
    let (mut year, mut month) = (after.year(), after.month());
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = date.and_time(NaiveTime::MIN).and_utc();
            if candidate > after {
                return candidate;
            }
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
}

/// Outcome of one job sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub job: &'static str,
    pub tenants: u32,
    pub failures: u32,
}

impl JobReport {
    pub fn is_ok(&self) -> bool {
        self.failures == 0
    }
}

pub struct OutreachScheduler {
    service: Arc<OutreachService>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
}

impl OutreachScheduler {
    pub fn new(service: Arc<OutreachService>, config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            config,
            clock,
        }
    }

    async fn sweep<F, Fut>(&self, job: &'static str, run: F) -> JobReport
    where
        F: Fn(Arc<OutreachService>, TenantId) -> Fut,
        Fut: Future<Output = OutreachResult<()>>,
    {
        let started = Instant::now();
        let mut report = JobReport {
            job,
            tenants: 0,
            failures: 0,
        };

        let tenants = match self.service.active_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(job, error = %e, "Failed to list tenants");
                report.failures += 1;
                metrics::record_scheduler_run(job, false, started.elapsed().as_secs_f64());
                return report;
            }
        };

        for tenant in tenants {
            report.tenants += 1;
            if let Err(e) = run(self.service.clone(), tenant.tenant_id.clone()).await {
                report.failures += 1;
                error!(job, tenant_id = %tenant.tenant_id, error = %e, "Scheduled job failed for tenant");
            }
        }

        metrics::record_scheduler_run(job, report.is_ok(), started.elapsed().as_secs_f64());
        debug!(job, tenants = report.tenants, failures = report.failures, "Scheduled job finished");
        report
    }

    pub async fn run_automated_outreach(&self) -> JobReport {
        self.sweep(jobs::AUTOMATED_OUTREACH, |service, tenant_id| async move {
            service.process_automated_outreach(&tenant_id).await.map(|_| ())
        })
        .await
    }

    pub async fn run_sequence_processing(&self) -> JobReport {
        self.sweep(jobs::SEQUENCE_PROCESSING, |service, tenant_id| async move {
            service.process_sequences(&tenant_id).await.map(|_| ())
        })
        .await
    }

    pub async fn run_benefits_snapshot(&self) -> JobReport {
        self.sweep(jobs::BENEFITS_SNAPSHOT, |service, tenant_id| async move {
            service.snapshot_benefits(&tenant_id).await.map(|captured| {
                debug!(tenant_id = %tenant_id, captured, "Benefits snapshot captured");
            })
        })
        .await
    }

    /// Not a per-tenant sweep: one call resets every tenant
    pub async fn run_usage_reset(&self) -> JobReport {
        let started = Instant::now();
        let result = self.service.reset_usage_counters(self.clock.now()).await;
        let report = match result {
            Ok(reset) => JobReport {
                job: jobs::USAGE_RESET,
                tenants: reset as u32,
                failures: 0,
            },
            Err(e) => {
                error!(error = %e, "Usage counter reset failed");
                JobReport {
                    job: jobs::USAGE_RESET,
                    tenants: 0,
                    failures: 1,
                }
            }
        };
        metrics::record_scheduler_run(jobs::USAGE_RESET, report.is_ok(), started.elapsed().as_secs_f64());
        report
    }

    /// Spawn the scheduler loop. Returns `None` when scheduling is disabled.
    pub async fn start(self: Arc<Self>) -> Option<SchedulerHandle> {
        if !self.config.enabled {
            warn!("Scheduler disabled, no background jobs will run");
            return None;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let running = Arc::new(RwLock::new(true));
        let running_clone = running.clone();

        let sequence_interval = Duration::from_secs(self.config.sequence_interval_secs.max(1));
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        let now = self.clock.now();
        let mut next_outreach = next_daily_run(now, self.config.automated_outreach_hour);
        let mut next_snapshot = next_daily_run(now, self.config.benefits_snapshot_hour);
        let mut next_reset = next_monthly_run(now, self.config.usage_reset_day);

        info!(
            next_outreach = %next_outreach,
            next_snapshot = %next_snapshot,
            next_reset = %next_reset,
            sequence_interval_secs = sequence_interval.as_secs(),
            "Scheduler started"
        );

        let scheduler = self;
        tokio::spawn(async move {
            let mut sequence_timer = interval(sequence_interval);
            let mut poll_timer = interval(poll_interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                    _ = sequence_timer.tick() => {
                        if *running_clone.read().await {
                            scheduler.run_sequence_processing().await;
                        }
                    }
                    _ = poll_timer.tick() => {
                        if !*running_clone.read().await {
                            continue;
                        }
                        let now = scheduler.clock.now();
                        if now >= next_snapshot {
                            scheduler.run_benefits_snapshot().await;
                            next_snapshot = next_daily_run(now, scheduler.config.benefits_snapshot_hour);
                        }
                        if now >= next_outreach {
                            scheduler.run_automated_outreach().await;
                            next_outreach = next_daily_run(now, scheduler.config.automated_outreach_hour);
                        }
                        if now >= next_reset {
                            scheduler.run_usage_reset().await;
                            next_reset = next_monthly_run(now, scheduler.config.usage_reset_day);
                        }
                    }
                }
            }

            info!("Scheduler stopped");
        });

        Some(SchedulerHandle {
            shutdown_tx,
            running,
        })
    }
}

/// Control handle for a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Keep the loop alive but skip jobs
    pub async fn pause(&self) {
        *self.running.write().await = false;
    }

    pub async fn resume(&self) {
        *self.running.write().await = true;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
