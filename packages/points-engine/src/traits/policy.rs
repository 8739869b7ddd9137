//! Point-value policy consulted at accept-time.

use crate::types::submission::SubmissionKind;

/// Pure lookup from a submission's classification to its point value.
///
/// `None` is a lookup miss: the submission is stored as pending with zero
/// points rather than failing the scan.
pub trait PointPolicy: Send + Sync {
    fn value_for(&self, kind: SubmissionKind, platform: &str, post_type: &str) -> Option<i64>;
}
