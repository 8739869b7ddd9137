//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two independent repeating jobs:
//! - Window scan, every `SCAN_INTERVAL_HOURS`
//! - Reconciliation pass, every `RECONCILE_INTERVAL_HOURS`
//!
//! A long scan never delays the reconciler. If a job is still running when
//! its next tick fires, that tick is skipped.
//!
//! ```text
//! Scheduler (every 6h)            Scheduler (every 24h)
//!     │                               │
//!     └─► run_scan()                  └─► run_reconciliation()
//!             └─► fetch → classify →          └─► sweep → totals →
//!                 record → credit                 overwrite ledger
//! ```

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::kernel::deps::PointsEngine;

/// Lets at most one run of a job proceed at a time.
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<()>>,
}

impl RunGuard {
    /// Claim the job, or `None` if a previous run still holds it.
    pub fn try_start(&self) -> Option<OwnedMutexGuard<()>> {
        self.running.clone().try_lock_owned().ok()
    }
}

/// Start all scheduled tasks
pub async fn start_scheduler(engine: Arc<PointsEngine>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let scan_interval = engine.scan_config().interval;
    let reconcile_interval = engine.reconcile_config().interval;

    let scan_engine = engine.clone();
    let scan_guard = RunGuard::default();
    let scan_job = Job::new_repeated_async(scan_interval, move |_uuid, _lock| {
        let engine = scan_engine.clone();
        let guard = scan_guard.clone();
        Box::pin(async move {
            let Some(_running) = guard.try_start() else {
                tracing::warn!("Previous scan still running, skipping this tick");
                return;
            };
            run_scan(&engine).await;
        })
    })?;

    scheduler.add(scan_job).await?;

    let reconcile_engine = engine.clone();
    let reconcile_guard = RunGuard::default();
    let reconcile_job = Job::new_repeated_async(reconcile_interval, move |_uuid, _lock| {
        let engine = reconcile_engine.clone();
        let guard = reconcile_guard.clone();
        Box::pin(async move {
            let Some(_running) = guard.try_start() else {
                tracing::warn!("Previous reconciliation still running, skipping this tick");
                return;
            };
            run_reconciliation(&engine).await;
        })
    })?;

    scheduler.add(reconcile_job).await?;
    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (scan every {}h, reconciliation every {}h)",
        scan_interval.as_secs() / 3600,
        reconcile_interval.as_secs() / 3600
    );
    Ok(scheduler)
}

/// Run one window scan and log the summary.
pub async fn run_scan(engine: &PointsEngine) {
    tracing::info!("Running scheduled scan");

    match engine.run_scan(Utc::now()).await {
        Ok(summary) => tracing::info!(
            "Scan complete: {} events, {} accepted (+{} pts), {} duplicates skipped",
            summary.events_scanned,
            summary.accepted,
            summary.points_awarded,
            summary.duplicates_skipped()
        ),
        Err(e) => tracing::error!("Scheduled scan failed: {}", e),
    }
}

/// Run one reconciliation pass and log the report.
pub async fn run_reconciliation(engine: &PointsEngine) {
    tracing::info!("Running scheduled reconciliation");

    match engine.run_reconciliation(Utc::now()).await {
        Ok(report) => tracing::info!(
            "Reconciliation complete: {} checked, {} corrected, drift {}",
            report.ambassadors_checked,
            report.ambassadors_corrected,
            report.point_drift
        ),
        Err(e) => tracing::error!("Scheduled reconciliation failed: {}", e),
    }
}
