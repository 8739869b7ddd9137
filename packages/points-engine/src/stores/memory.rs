//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::fingerprint::Fingerprint;
use crate::traits::store::{demotions_first, LedgerStore, PointsStore, SubmissionStore, TotalsFn};
use crate::types::{
    ledger::{CalendarMonth, LedgerRebuild, LedgerRow, LedgerTotals},
    submission::{NewSubmission, Reclassification, RecordOutcome, Submission, SubmissionFilter},
};

/// In-memory storage for submissions and the ledger.
///
/// All state sits behind one mutex, so every trait operation is atomic with
/// respect to every other. Not suitable for production as data is lost on
/// restart.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Submission>,
    by_id: HashMap<String, usize>,
    by_fingerprint: HashMap<(String, Fingerprint), Vec<usize>>,
    ledger: BTreeMap<String, LedgerRow>,
}

impl Inner {
    fn insert(&mut self, row: Submission) {
        let index = self.rows.len();
        self.by_id.insert(row.id.clone(), index);
        self.by_fingerprint
            .entry((row.ambassador_id.clone(), row.fingerprint.clone()))
            .or_default()
            .push(index);
        self.rows.push(row);
    }

    fn group(&self, ambassador_id: &str, fingerprint: &Fingerprint) -> impl Iterator<Item = &Submission> {
        self.by_fingerprint
            .get(&(ambassador_id.to_string(), fingerprint.clone()))
            .into_iter()
            .flatten()
            .map(|&i| &self.rows[i])
    }

    fn record(&mut self, submission: NewSubmission) -> RecordOutcome {
        let mut canonical = None;
        for row in self.group(&submission.ambassador_id, &submission.fingerprint) {
            if row.source_event_id == submission.source_event_id {
                return RecordOutcome::AlreadySeen(row.clone());
            }
            if !row.is_duplicate {
                canonical = Some(row.clone());
            }
        }

        let id = Uuid::now_v7().to_string();
        match canonical {
            Some(canonical) => {
                let recorded = submission.into_duplicate(id);
                self.insert(recorded.clone());
                RecordOutcome::Duplicate {
                    recorded,
                    canonical,
                }
            }
            None => {
                let recorded = submission.into_canonical(id);
                self.insert(recorded.clone());
                RecordOutcome::Accepted(recorded)
            }
        }
    }

    fn credit(
        &mut self,
        ambassador_id: &str,
        points: i64,
        in_period: bool,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) {
        self.ledger
            .entry(ambassador_id.to_string())
            .or_insert_with(|| LedgerRow::new(ambassador_id, period, LedgerTotals::default(), at))
            .credit(points, in_period, period, at);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Insert a row verbatim, bypassing duplicate detection.
    ///
    /// For importing legacy data, which may already violate the
    /// one-canonical-row-per-fingerprint rule the reconciler repairs.
    pub fn import_submission(&self, row: Submission) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.by_id.contains_key(&row.id) {
            return Err(EngineError::store(format!("duplicate row id {}", row.id)));
        }
        inner.insert(row);
        Ok(())
    }

    /// Get the number of stored submissions.
    pub fn submission_count(&self) -> usize {
        self.lock().map(|inner| inner.rows.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| EngineError::store("memory store lock poisoned"))
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn record_submission(&self, submission: NewSubmission) -> Result<RecordOutcome> {
        Ok(self.lock()?.record(submission))
    }

    async fn find_canonical(
        &self,
        ambassador_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Submission>> {
        let inner = self.lock()?;
        let found = inner
            .group(ambassador_id, fingerprint)
            .find(|row| !row.is_duplicate)
            .cloned();
        Ok(found)
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let inner = self.lock()?;
        Ok(inner.by_id.get(id).map(|&i| inner.rows[i].clone()))
    }

    async fn submissions_for(
        &self,
        ambassador_id: &str,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>> {
        let inner = self.lock()?;
        let mut rows: Vec<Submission> = inner
            .rows
            .iter()
            .filter(|row| row.ambassador_id == ambassador_id && filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.canonical_order().cmp(&b.canonical_order()));
        Ok(rows)
    }

    async fn ambassadors(&self) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let mut ids: Vec<String> = inner.rows.iter().map(|r| r.ambassador_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn reclassify(&self, changes: &[Reclassification]) -> Result<usize> {
        let mut inner = self.lock()?;

        // Resolve every row before touching any, so a bad ID changes nothing
        let mut targets = Vec::with_capacity(changes.len());
        for change in demotions_first(changes) {
            let Some(&index) = inner.by_id.get(&change.submission_id) else {
                return Err(EngineError::CorruptRow {
                    id: change.submission_id.clone(),
                    reason: "reclassified row does not exist".into(),
                });
            };
            targets.push((index, change));
        }

        let mut changed = 0;
        for (index, change) in targets {
            let row = &mut inner.rows[index];
            if change.is_noop_for(row) {
                continue;
            }
            row.is_duplicate = change.is_duplicate;
            row.validity_status = change.validity_status;
            row.points_awarded = change.points_awarded;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_ledger(&self, ambassador_id: &str) -> Result<Option<LedgerRow>> {
        Ok(self.lock()?.ledger.get(ambassador_id).cloned())
    }

    async fn list_ledger(&self) -> Result<Vec<LedgerRow>> {
        let mut rows: Vec<LedgerRow> = self.lock()?.ledger.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.lifetime_points
                .cmp(&a.lifetime_points)
                .then_with(|| a.ambassador_id.cmp(&b.ambassador_id))
        });
        Ok(rows)
    }

    async fn credit_provisional(
        &self,
        ambassador_id: &str,
        points: i64,
        in_period: bool,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.lock()?
            .credit(ambassador_id, points, in_period, period, at);
        Ok(())
    }

    async fn overwrite_ledger(&self, row: &LedgerRow) -> Result<()> {
        self.lock()?
            .ledger
            .insert(row.ambassador_id.clone(), row.clone());
        Ok(())
    }
}

#[async_trait]
impl PointsStore for MemoryStore {
    async fn record_and_credit(
        &self,
        submission: NewSubmission,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let mut inner = self.lock()?;
        let outcome = inner.record(submission);
        if let RecordOutcome::Accepted(row) = &outcome {
            let (points, in_period) = row.provisional_credit(period);
            inner.credit(&row.ambassador_id, points, in_period, period, at);
        }
        Ok(outcome)
    }

    async fn rebuild_ledger(
        &self,
        ambassador_id: &str,
        period: CalendarMonth,
        at: DateTime<Utc>,
        totals: &TotalsFn,
    ) -> Result<LedgerRebuild> {
        let mut inner = self.lock()?;
        let credited: Vec<Submission> = inner
            .rows
            .iter()
            .filter(|row| row.ambassador_id == ambassador_id && row.is_credited())
            .cloned()
            .collect();

        let new = totals(credited.as_slice());
        let rebuild = LedgerRebuild::compare(inner.ledger.get(ambassador_id), period, new);
        if rebuild.rewritten {
            inner.ledger.insert(
                ambassador_id.to_string(),
                LedgerRow::new(ambassador_id, period, rebuild.new, at),
            );
        }
        Ok(rebuild)
    }
}
