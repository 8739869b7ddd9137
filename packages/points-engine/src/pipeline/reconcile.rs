//! Points reconciler: converge the ledger to a function of the submission set.
//!
//! Per ambassador, in sorted order:
//! 1. Sweep fingerprint groups and reclassify inconsistent rows
//! 2. Recompute monthly, lifetime and standing figures from credited rows and
//!    overwrite the ledger row when it differs, atomically in the store
//! 3. Report the correction

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pipeline::{standing::calculate_totals, sweep::plan_duplicate_sweep};
use crate::traits::{sink::MirrorSink, store::PointsStore};
use crate::types::{
    config::ReconcileConfig,
    ledger::CalendarMonth,
    report::{AmbassadorFailure, LedgerCorrection, ReconcileReport},
    submission::{Submission, SubmissionFilter},
};

/// Result of reconciling one ambassador.
#[derive(Debug, Default)]
struct AmbassadorOutcome {
    reclassified: usize,
    correction: Option<LedgerCorrection>,
}

/// Run one reconciliation pass as of `now`.
///
/// Every ambassador with a submission or a ledger row is checked. A failure
/// scoped to one ambassador (for example an undecodable row) is reported and
/// the pass continues; a store outage aborts it. Running the pass twice with
/// no ingestion in between yields no corrections the second time.
pub async fn reconcile<S, K>(
    store: &S,
    sink: &K,
    config: &ReconcileConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport>
where
    S: PointsStore + ?Sized,
    K: MirrorSink + ?Sized,
{
    config.validate()?;
    let period = CalendarMonth::of(now);
    let mut report = ReconcileReport::new(period);

    let mut ambassadors: BTreeSet<String> = store.ambassadors().await?.into_iter().collect();
    ambassadors.extend(
        store
            .list_ledger()
            .await?
            .into_iter()
            .map(|row| row.ambassador_id),
    );

    info!(period = %period, ambassadors = ambassadors.len(), "Reconciling ledger");

    for ambassador_id in ambassadors {
        report.ambassadors_checked += 1;
        match reconcile_ambassador(store, &ambassador_id, config, period, now).await {
            Ok(outcome) => {
                report.rows_reclassified += outcome.reclassified;
                if let Some(correction) = outcome.correction {
                    info!(%correction, "Corrected ledger row");
                    if let Err(err) = sink.ledger_corrected(&correction).await {
                        warn!(ambassador_id = %ambassador_id, error = %err, "Mirror sink rejected correction");
                    }
                    report.record_correction(correction);
                }
            }
            Err(err) if err.is_batch_fatal() => return Err(err),
            Err(err) => {
                warn!(ambassador_id = %ambassador_id, error = %err, "Skipping ambassador");
                report.failures.push(AmbassadorFailure {
                    ambassador_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        checked = report.ambassadors_checked,
        corrected = report.ambassadors_corrected,
        drift = report.point_drift,
        reclassified = report.rows_reclassified,
        failures = report.failures.len(),
        "Reconciliation complete"
    );
    Ok(report)
}

async fn reconcile_ambassador<S>(
    store: &S,
    ambassador_id: &str,
    config: &ReconcileConfig,
    period: CalendarMonth,
    now: DateTime<Utc>,
) -> Result<AmbassadorOutcome>
where
    S: PointsStore + ?Sized,
{
    let mut outcome = AmbassadorOutcome::default();

    let rows = store
        .submissions_for(ambassador_id, &SubmissionFilter::all())
        .await?;
    let changes = plan_duplicate_sweep(&rows);
    if !changes.is_empty() {
        warn!(
            ambassador_id = %ambassador_id,
            changes = changes.len(),
            "Duplicate sweep reclassifying rows"
        );
        outcome.reclassified = store.reclassify(&changes).await?;
    }

    // Read, recompute and overwrite in one store step, so a scan credit for
    // this ambassador lands either wholly before it or wholly after it
    let monthly_minimum = config.monthly_minimum;
    let rebuild = store
        .rebuild_ledger(ambassador_id, period, now, &move |rows: &[Submission]| {
            calculate_totals(rows, period, monthly_minimum)
        })
        .await?;

    if rebuild.is_correction() {
        outcome.correction = Some(LedgerCorrection {
            ambassador_id: ambassador_id.to_string(),
            period,
            old: rebuild.old,
            new: rebuild.new,
        });
    } else if !rebuild.rewritten {
        debug!(ambassador_id = %ambassador_id, "Ledger row up to date");
    }

    Ok(outcome)
}
