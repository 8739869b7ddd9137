//! The Engine - main entry point for operators and schedulers.
//!
//! Bundles a store, an event source, a point policy, and a mirror sink with
//! their configuration, and exposes the operator surface:
//! - `run_scan()` - scan the trailing window now
//! - `run_reconciliation()` - run a reconciliation pass now
//! - `ledger_for()` - report the ledger for one ambassador

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::pipeline::{reconcile::reconcile, scan::scan_window};
use crate::traits::{
    policy::PointPolicy, sink::MirrorSink, source::EventSource, store::PointsStore,
};
use crate::types::{
    config::{ReconcileConfig, ScanConfig},
    ledger::LedgerRow,
    report::{ReconcileReport, ScanSummary},
    submission::{Submission, SubmissionFilter},
};

/// Scan and reconciliation over one store.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new(store, source, RulesTable::default(), NoopSink, ScanConfig::new("ambassadors"));
///
/// let summary = engine.run_scan(Utc::now()).await?;
/// let report = engine.run_reconciliation(Utc::now()).await?;
/// let row = engine.ledger_for("1234").await?;
/// ```
pub struct Engine<S, E, P, K>
where
    S: PointsStore,
    E: EventSource,
    P: PointPolicy,
    K: MirrorSink,
{
    store: S,
    source: E,
    policy: P,
    sink: K,
    scan: ScanConfig,
    reconcile: ReconcileConfig,
}

impl<S, E, P, K> Engine<S, E, P, K>
where
    S: PointsStore,
    E: EventSource,
    P: PointPolicy,
    K: MirrorSink,
{
    /// Create an engine with the default reconciliation settings.
    pub fn new(store: S, source: E, policy: P, sink: K, scan: ScanConfig) -> Self {
        Self {
            store,
            source,
            policy,
            sink,
            scan,
            reconcile: ReconcileConfig::default(),
        }
    }

    pub fn with_reconcile_config(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn scan_config(&self) -> &ScanConfig {
        &self.scan
    }

    pub fn reconcile_config(&self) -> &ReconcileConfig {
        &self.reconcile
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Scan the window ending at `now`.
    pub async fn run_scan(&self, now: DateTime<Utc>) -> Result<ScanSummary> {
        scan_window(
            &self.store,
            &self.source,
            &self.policy,
            &self.sink,
            &self.scan,
            now,
        )
        .await
    }

    /// Reconcile the whole ledger as of `now`.
    pub async fn run_reconciliation(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        reconcile(&self.store, &self.sink, &self.reconcile, now).await
    }

    /// The ledger row for one ambassador, if they have been seen.
    pub async fn ledger_for(&self, ambassador_id: &str) -> Result<Option<LedgerRow>> {
        self.store.get_ledger(ambassador_id).await
    }

    /// Every ledger row, highest lifetime points first.
    pub async fn leaderboard(&self) -> Result<Vec<LedgerRow>> {
        self.store.list_ledger().await
    }

    /// All of an ambassador's submissions, duplicates included.
    pub async fn submissions_for(&self, ambassador_id: &str) -> Result<Vec<Submission>> {
        self.store
            .submissions_for(ambassador_id, &SubmissionFilter::all())
            .await
    }
}
