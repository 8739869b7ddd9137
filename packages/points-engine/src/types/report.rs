//! Reports returned to the operator after a scan or reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::Fingerprint;
use crate::types::ledger::{CalendarMonth, LedgerTotals};

/// What the scanner decided for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ScanDecision {
    /// New canonical row with points
    Accepted { submission_id: String, points: i64 },

    /// New canonical row awaiting review (no point value known)
    Pending { submission_id: String },

    /// Repeat of an earlier submission, stored with zero points
    Duplicate {
        submission_id: String,
        canonical_id: String,
    },

    /// Same event seen in an earlier scan; nothing written
    AlreadySeen { submission_id: String },

    /// Could not be turned into a submission
    Malformed { reason: String },
}

/// Decision for one candidate, with enough context to trace it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub source_event_id: String,
    pub ambassador_id: String,
    pub fingerprint: Option<Fingerprint>,
    #[serde(flatten)]
    pub decision: ScanDecision,
}

/// Summary of one window scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Start of the scanned window
    pub since: DateTime<Utc>,

    /// Events returned by the source
    pub events_scanned: usize,

    /// Events dropped for predating the window
    pub out_of_window: usize,

    /// Events with neither a URL nor a screenshot
    pub ignored_events: usize,

    pub accepted: usize,
    pub pending: usize,
    pub duplicates: usize,
    pub already_seen: usize,
    pub malformed: usize,

    /// Points provisionally credited by this scan
    pub points_awarded: i64,

    pub outcomes: Vec<CandidateOutcome>,
}

impl ScanSummary {
    pub fn new(since: DateTime<Utc>) -> Self {
        Self {
            since,
            events_scanned: 0,
            out_of_window: 0,
            ignored_events: 0,
            accepted: 0,
            pending: 0,
            duplicates: 0,
            already_seen: 0,
            malformed: 0,
            points_awarded: 0,
            outcomes: Vec::new(),
        }
    }

    /// Duplicates skipped, whether newly recorded or re-fetched.
    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates + self.already_seen
    }

    pub fn record(&mut self, outcome: CandidateOutcome) {
        match &outcome.decision {
            ScanDecision::Accepted { points, .. } => {
                self.accepted += 1;
                self.points_awarded += points;
            }
            ScanDecision::Pending { .. } => self.pending += 1,
            ScanDecision::Duplicate { .. } => self.duplicates += 1,
            ScanDecision::AlreadySeen { .. } => self.already_seen += 1,
            ScanDecision::Malformed { .. } => self.malformed += 1,
        }
        self.outcomes.push(outcome);
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan since {}", self.since.to_rfc3339())?;
        writeln!(f, "  events scanned:     {}", self.events_scanned)?;
        writeln!(f, "  accepted:           {} (+{} pts)", self.accepted, self.points_awarded)?;
        writeln!(f, "  pending review:     {}", self.pending)?;
        writeln!(f, "  duplicates skipped: {}", self.duplicates_skipped())?;
        writeln!(f, "  malformed:          {}", self.malformed)?;
        write!(
            f,
            "  ignored:            {} ({} outside window)",
            self.ignored_events, self.out_of_window
        )
    }
}

/// One ledger row the reconciler had to overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCorrection {
    pub ambassador_id: String,
    pub period: CalendarMonth,
    pub old: LedgerTotals,
    pub new: LedgerTotals,
}

impl LedgerCorrection {
    pub fn month_delta(&self) -> i64 {
        self.new.current_period_points - self.old.current_period_points
    }

    pub fn lifetime_delta(&self) -> i64 {
        self.new.lifetime_points - self.old.lifetime_points
    }

    /// Absolute point drift this correction removed.
    pub fn drift(&self) -> i64 {
        self.month_delta().abs() + self.lifetime_delta().abs()
    }
}

impl fmt::Display for LedgerCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: month {} -> {} ({:+}), lifetime {} -> {} ({:+})",
            self.ambassador_id,
            self.old.current_period_points,
            self.new.current_period_points,
            self.month_delta(),
            self.old.lifetime_points,
            self.new.lifetime_points,
            self.lifetime_delta()
        )?;
        if self.old.reward_tier != self.new.reward_tier {
            write!(f, ", tier {} -> {}", self.old.reward_tier, self.new.reward_tier)?;
        }
        Ok(())
    }
}

/// An ambassador the reconciler could not process this pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbassadorFailure {
    pub ambassador_id: String,
    pub reason: String,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub period: CalendarMonth,
    pub ambassadors_checked: usize,
    pub ambassadors_corrected: usize,
    /// Sum of absolute monthly and lifetime deltas
    pub point_drift: i64,
    /// Rows demoted or promoted by the duplicate sweep
    pub rows_reclassified: usize,
    pub corrections: Vec<LedgerCorrection>,
    pub failures: Vec<AmbassadorFailure>,
}

impl ReconcileReport {
    pub fn new(period: CalendarMonth) -> Self {
        Self {
            period,
            ambassadors_checked: 0,
            ambassadors_corrected: 0,
            point_drift: 0,
            rows_reclassified: 0,
            corrections: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_correction(&mut self, correction: LedgerCorrection) {
        self.ambassadors_corrected += 1;
        self.point_drift += correction.drift();
        self.corrections.push(correction);
    }

    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.rows_reclassified == 0 && self.failures.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Points audit for {}", self.period)?;
        writeln!(f, "  ambassadors checked:   {}", self.ambassadors_checked)?;
        writeln!(f, "  ambassadors corrected: {}", self.ambassadors_corrected)?;
        writeln!(f, "  total point drift:     {}", self.point_drift)?;
        write!(f, "  rows reclassified:     {}", self.rows_reclassified)?;
        for correction in &self.corrections {
            write!(f, "\n  - {correction}")?;
        }
        for failure in &self.failures {
            write!(f, "\n  ! {}: {}", failure.ambassador_id, failure.reason)?;
        }
        Ok(())
    }
}
