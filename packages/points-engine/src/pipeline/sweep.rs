//! Duplicate sweep: repair fingerprint groups that ended up with the wrong
//! canonical row.
//!
//! The store's uniqueness rules already prevent two canonical rows for one
//! fingerprint. Rows can still disagree with the earliest-wins rule when an
//! older copy arrives in a later scan, or when legacy data was imported
//! without duplicate detection.

use std::collections::BTreeMap;

use crate::fingerprint::Fingerprint;
use crate::types::submission::{Reclassification, Submission, ValidityStatus};

/// Plan the reclassifications that make every fingerprint group consistent.
///
/// Rejected rows are left alone. In each remaining group the earliest row by
/// (`submitted_at`, `source_event_id`) becomes canonical and takes over the
/// points and status of the row that held the credit; all other rows become
/// zero-point duplicates. Groups without any canonical row are not touched.
pub fn plan_duplicate_sweep(rows: &[Submission]) -> Vec<Reclassification> {
    let mut groups: BTreeMap<(&str, &Fingerprint), Vec<&Submission>> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|row| row.validity_status != ValidityStatus::Rejected)
    {
        groups
            .entry((row.ambassador_id.as_str(), &row.fingerprint))
            .or_default()
            .push(row);
    }

    let mut changes = Vec::new();
    for mut group in groups.into_values() {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| a.canonical_order().cmp(&b.canonical_order()));

        let Some(credit) = group.iter().find(|row| !row.is_duplicate) else {
            continue;
        };
        let (validity_status, points_awarded) = (credit.validity_status, credit.points_awarded);

        for (position, row) in group.iter().enumerate() {
            let desired = if position == 0 {
                Reclassification {
                    submission_id: row.id.clone(),
                    is_duplicate: false,
                    validity_status,
                    points_awarded,
                }
            } else {
                Reclassification::duplicate_of_canonical(row)
            };
            if !desired.is_noop_for(row) {
                changes.push(desired);
            }
        }
    }
    changes
}
