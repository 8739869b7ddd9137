//! Storage traits for submissions and the ledger.
//!
//! The storage layer is split into focused traits:
//! - `SubmissionStore`: the durable set of submissions (source of truth)
//! - `LedgerStore`: materialized per-ambassador totals (a cache)
//! - `PointsStore`: both, plus the operations that span them atomically

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::types::{
    ledger::{CalendarMonth, LedgerRebuild, LedgerRow, LedgerTotals},
    submission::{NewSubmission, Reclassification, RecordOutcome, Submission, SubmissionFilter},
};

/// The durable set of all submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Atomically check for an existing (`ambassador_id`, `fingerprint`) and
    /// record the candidate.
    ///
    /// - same source event already recorded → `AlreadySeen`, nothing written
    /// - fingerprint already has a canonical row → stored as a zero-point
    ///   duplicate
    /// - otherwise → stored as the canonical row with its points
    ///
    /// Two concurrent calls for the same fingerprint must never both produce
    /// a canonical row.
    async fn record_submission(&self, submission: NewSubmission) -> Result<RecordOutcome>;

    /// The canonical (non-duplicate) row for a fingerprint, if any.
    async fn find_canonical(
        &self,
        ambassador_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Submission>>;

    /// Get a row by ID.
    async fn get_submission(&self, id: &str) -> Result<Option<Submission>>;

    /// Rows for one ambassador matching a filter, in canonical order.
    async fn submissions_for(
        &self,
        ambassador_id: &str,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>>;

    /// Every ambassador with at least one submission, sorted.
    async fn ambassadors(&self) -> Result<Vec<String>>;

    /// Apply classification corrections in place, atomically: either every
    /// change lands or none does.
    ///
    /// Demotions are applied before promotions so a fingerprint never has two
    /// canonical rows. Returns the number of rows changed.
    async fn reclassify(&self, changes: &[Reclassification]) -> Result<usize>;
}

/// Materialized per-ambassador point totals.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get one ambassador's row.
    async fn get_ledger(&self, ambassador_id: &str) -> Result<Option<LedgerRow>>;

    /// All rows, highest lifetime points first.
    async fn list_ledger(&self) -> Result<Vec<LedgerRow>>;

    /// Provisionally credit points at accept-time, creating the row on first
    /// sight of the ambassador.
    ///
    /// `in_period` says whether the submission falls in `period`. When the
    /// stored row refers to an older period its monthly figure restarts.
    async fn credit_provisional(
        &self,
        ambassador_id: &str,
        points: i64,
        in_period: bool,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Overwrite a row wholesale, e.g. when importing legacy totals.
    async fn overwrite_ledger(&self, row: &LedgerRow) -> Result<()>;
}

/// Computes ledger figures from one ambassador's credited rows.
pub type TotalsFn = dyn Fn(&[Submission]) -> LedgerTotals + Send + Sync;

/// Storage used by the scanner and the reconciler.
///
/// Both operations here touch the submission set and the ledger together,
/// and must be atomic with respect to each other for the same ambassador.
/// Otherwise a scan credit landing between the reconciler's read and its
/// overwrite would be lost from the ledger.
#[async_trait]
pub trait PointsStore: SubmissionStore + LedgerStore {
    /// Record a candidate and, when it becomes the canonical row, apply its
    /// provisional ledger credit in the same step.
    async fn record_and_credit(
        &self,
        submission: NewSubmission,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<RecordOutcome>;

    /// Recompute one ambassador's ledger row from their credited rows and
    /// overwrite it when it differs or refers to an older period.
    async fn rebuild_ledger(
        &self,
        ambassador_id: &str,
        period: CalendarMonth,
        at: DateTime<Utc>,
        totals: &TotalsFn,
    ) -> Result<LedgerRebuild>;
}

/// Order reclassifications so demotions land before promotions.
pub fn demotions_first(changes: &[Reclassification]) -> Vec<&Reclassification> {
    let mut ordered: Vec<_> = changes.iter().collect();
    ordered.sort_by_key(|c| !c.is_duplicate);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::submission::ValidityStatus;

    fn change(id: &str, is_duplicate: bool) -> Reclassification {
        Reclassification {
            submission_id: id.into(),
            is_duplicate,
            validity_status: ValidityStatus::Accepted,
            points_awarded: 0,
        }
    }

    #[test]
    fn test_demotions_first() {
        let changes = vec![change("promote", false), change("demote", true)];
        let ordered = demotions_first(&changes);
        assert_eq!(ordered[0].submission_id, "demote");
        assert_eq!(ordered[1].submission_id, "promote");
    }
}
