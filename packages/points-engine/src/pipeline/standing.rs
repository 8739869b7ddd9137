//! Ledger totals and standing, computed from credited submissions.

use std::collections::HashMap;

use crate::types::{
    ledger::{CalendarMonth, LedgerTotals, RewardTier},
    submission::Submission,
};

/// Compute an ambassador's ledger figures from their rows.
///
/// Rows that are not credited (duplicate, rejected, pending) are ignored, so
/// callers may pass an unfiltered set. The monthly and lifetime figures are
/// two independent sums over differently scoped partitions.
pub fn calculate_totals(rows: &[Submission], current: CalendarMonth, monthly_minimum: i64) -> LedgerTotals {
    let credited: Vec<&Submission> = rows.iter().filter(|row| row.is_credited()).collect();

    let lifetime_points: i64 = credited.iter().map(|row| row.points_awarded).sum();
    let current_period_points: i64 = credited
        .iter()
        .filter(|row| CalendarMonth::of(row.submitted_at) == current)
        .map(|row| row.points_awarded)
        .sum();

    let consecutive_months = consecutive_months(&monthly_points(&credited), current, monthly_minimum);

    LedgerTotals {
        current_period_points,
        lifetime_points,
        consecutive_months,
        reward_tier: RewardTier::for_streak(consecutive_months),
    }
}

fn monthly_points(credited: &[&Submission]) -> HashMap<CalendarMonth, i64> {
    let mut months = HashMap::new();
    for row in credited {
        *months.entry(CalendarMonth::of(row.submitted_at)).or_insert(0) += row.points_awarded;
    }
    months
}

/// Completed months in a row, ending with the month before `current`, whose
/// total met `minimum`. The month in progress never counts.
pub fn consecutive_months(
    months: &HashMap<CalendarMonth, i64>,
    current: CalendarMonth,
    minimum: i64,
) -> u32 {
    let Some(&first) = months.keys().min() else {
        return 0;
    };

    let mut streak = 0;
    let mut month = current.previous();
    while month >= first && months.get(&month).copied().unwrap_or(0) >= minimum {
        streak += 1;
        month = month.previous();
    }
    streak
}
