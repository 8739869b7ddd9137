//! Submission rows.
//!
//! The content payload of a row is fixed at creation. Only the classification
//! state (`is_duplicate`, `validity_status`, `points_awarded`) ever changes,
//! and only through a [`Reclassification`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::Fingerprint;
use crate::types::ledger::CalendarMonth;

/// What kind of proof-of-work an ambassador submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Url,
    Screenshot,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Screenshot => "screenshot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "url" => Some(Self::Url),
            "screenshot" => Some(Self::Screenshot),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Accepted,
    Rejected,
    /// Awaiting review; carries no points
    Pending,
}

impl ValidityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed content payload of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionContent {
    /// A shared post link, already normalized
    Url { url: String },

    /// A screenshot attachment, identified by name and size only
    Screenshot { filename: String, byte_size: u64 },
}

impl SubmissionContent {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Self::Url { .. } => SubmissionKind::Url,
            Self::Screenshot { .. } => SubmissionKind::Screenshot,
        }
    }
}

impl fmt::Display for SubmissionContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url { url } => f.write_str(url),
            Self::Screenshot {
                filename,
                byte_size,
            } => write!(f, "{filename} ({byte_size} bytes)"),
        }
    }
}

/// A stored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Store-assigned row ID (UUID v7)
    pub id: String,

    pub ambassador_id: String,

    pub fingerprint: Fingerprint,

    pub content: SubmissionContent,

    pub platform: String,

    pub post_type: String,

    /// Zero for duplicates and pending rows
    pub points_awarded: i64,

    /// Repeat of an earlier fingerprint; never contributes to totals
    pub is_duplicate: bool,

    pub validity_status: ValidityStatus,

    /// Used only for windowing and month bucketing
    pub submitted_at: DateTime<Utc>,

    /// Originating chat message, for audit only
    pub source_event_id: String,
}

impl Submission {
    pub fn kind(&self) -> SubmissionKind {
        self.content.kind()
    }

    /// Whether this row counts toward ledger totals.
    pub fn is_credited(&self) -> bool {
        !self.is_duplicate && self.validity_status == ValidityStatus::Accepted
    }

    /// Sort key deciding which row of a fingerprint group is canonical.
    ///
    /// Earliest `submitted_at` wins; ties go to the lexically smallest event ID.
    pub fn canonical_order(&self) -> (DateTime<Utc>, &str) {
        (self.submitted_at, &self.source_event_id)
    }

    /// Accept-time ledger credit as seen from `period`: the points this row
    /// adds, and whether they land in that month.
    pub fn provisional_credit(&self, period: CalendarMonth) -> (i64, bool) {
        let points = if self.is_credited() { self.points_awarded } else { 0 };
        (points, CalendarMonth::of(self.submitted_at) == period)
    }
}

/// A submission about to be recorded. The store decides whether it becomes
/// canonical or a duplicate.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub ambassador_id: String,
    pub fingerprint: Fingerprint,
    pub content: SubmissionContent,
    pub platform: String,
    pub post_type: String,
    pub points_awarded: i64,
    pub validity_status: ValidityStatus,
    pub submitted_at: DateTime<Utc>,
    pub source_event_id: String,
}

impl NewSubmission {
    /// Materialize as the canonical row for its fingerprint.
    pub fn into_canonical(self, id: String) -> Submission {
        self.into_row(id, false)
    }

    /// Materialize as a duplicate audit row (no points).
    pub fn into_duplicate(self, id: String) -> Submission {
        self.into_row(id, true)
    }

    fn into_row(self, id: String, is_duplicate: bool) -> Submission {
        Submission {
            id,
            ambassador_id: self.ambassador_id,
            fingerprint: self.fingerprint,
            content: self.content,
            platform: self.platform,
            post_type: self.post_type,
            points_awarded: if is_duplicate { 0 } else { self.points_awarded },
            is_duplicate,
            validity_status: self.validity_status,
            submitted_at: self.submitted_at,
            source_event_id: self.source_event_id,
        }
    }
}

/// In-place correction of a row's classification state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reclassification {
    pub submission_id: String,
    pub is_duplicate: bool,
    pub validity_status: ValidityStatus,
    pub points_awarded: i64,
}

impl Reclassification {
    /// Demote a row to a zero-point duplicate, keeping its review state.
    pub fn duplicate_of_canonical(row: &Submission) -> Self {
        Self {
            submission_id: row.id.clone(),
            is_duplicate: true,
            validity_status: row.validity_status,
            points_awarded: 0,
        }
    }

    /// Whether this change would leave `row` untouched.
    pub fn is_noop_for(&self, row: &Submission) -> bool {
        row.is_duplicate == self.is_duplicate
            && row.validity_status == self.validity_status
            && row.points_awarded == self.points_awarded
    }
}

/// Result of recording one candidate in the store.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// First sighting of this fingerprint; the new row is canonical
    Accepted(Submission),

    /// Fingerprint already credited; the new row was stored as a duplicate
    Duplicate {
        recorded: Submission,
        canonical: Submission,
    },

    /// This exact event was recorded before; nothing was written
    AlreadySeen(Submission),
}

/// Row selection for reconciliation and display queries.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub validity_status: Option<ValidityStatus>,
    pub is_duplicate: Option<bool>,
    /// Inclusive lower bound on `submitted_at`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `submitted_at`
    pub until: Option<DateTime<Utc>>,
}

impl SubmissionFilter {
    /// Every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Accepted, non-duplicate rows.
    pub fn credited() -> Self {
        Self {
            validity_status: Some(ValidityStatus::Accepted),
            is_duplicate: Some(false),
            ..Self::default()
        }
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, row: &Submission) -> bool {
        self.validity_status.map_or(true, |s| row.validity_status == s)
            && self.is_duplicate.map_or(true, |d| row.is_duplicate == d)
            && self.since.map_or(true, |t| row.submitted_at >= t)
            && self.until.map_or(true, |t| row.submitted_at < t)
    }
}
