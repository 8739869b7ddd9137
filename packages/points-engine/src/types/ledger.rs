//! Ledger rows: the materialized per-ambassador point totals.
//!
//! A ledger row is a cache of the submission store. The reconciler overwrites
//! it wholesale; accept-time increments are provisional.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month in UTC, e.g. `2026-10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn of(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Parse the `YYYY-MM` form used in storage.
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.split_once('-')?;
        let year = year.parse().ok()?;
        let month = month.parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for CalendarMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid month: {value}")))
    }
}

/// Reward tier earned by consecutive compliant months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    #[default]
    None,
    ThreeMonthRecurring,
    SixMonthRecurring,
    CommissionBump5Pct,
    LifetimeCommissions,
}

impl RewardTier {
    pub fn for_streak(consecutive_months: u32) -> Self {
        match consecutive_months {
            12.. => Self::LifetimeCommissions,
            9..=11 => Self::CommissionBump5Pct,
            6..=8 => Self::SixMonthRecurring,
            3..=5 => Self::ThreeMonthRecurring,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ThreeMonthRecurring => "three_month_recurring",
            Self::SixMonthRecurring => "six_month_recurring",
            Self::CommissionBump5Pct => "commission_bump_5pct",
            Self::LifetimeCommissions => "lifetime_commissions",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "three_month_recurring" => Some(Self::ThreeMonthRecurring),
            "six_month_recurring" => Some(Self::SixMonthRecurring),
            "commission_bump_5pct" => Some(Self::CommissionBump5Pct),
            "lifetime_commissions" => Some(Self::LifetimeCommissions),
            _ => None,
        }
    }
}

impl fmt::Display for RewardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The figures a ledger row carries, compared by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub current_period_points: i64,
    pub lifetime_points: i64,
    pub consecutive_months: u32,
    pub reward_tier: RewardTier,
}

/// Per-ambassador ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub ambassador_id: String,

    /// Month `current_period_points` refers to
    pub period: CalendarMonth,

    pub current_period_points: i64,

    pub lifetime_points: i64,

    pub consecutive_months: u32,

    pub reward_tier: RewardTier,

    pub updated_at: DateTime<Utc>,
}

impl LedgerRow {
    pub fn new(
        ambassador_id: impl Into<String>,
        period: CalendarMonth,
        totals: LedgerTotals,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ambassador_id: ambassador_id.into(),
            period,
            current_period_points: totals.current_period_points,
            lifetime_points: totals.lifetime_points,
            consecutive_months: totals.consecutive_months,
            reward_tier: totals.reward_tier,
            updated_at,
        }
    }

    pub fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            current_period_points: self.current_period_points,
            lifetime_points: self.lifetime_points,
            consecutive_months: self.consecutive_months,
            reward_tier: self.reward_tier,
        }
    }

    /// Totals as seen from `period`: the monthly figure is stale once the
    /// month has rolled over.
    pub fn totals_for(&self, period: CalendarMonth) -> LedgerTotals {
        let mut totals = self.totals();
        if self.period != period {
            totals.current_period_points = 0;
        }
        totals
    }

    /// Apply a provisional accept-time credit.
    pub fn credit(&mut self, points: i64, in_period: bool, period: CalendarMonth, at: DateTime<Utc>) {
        if self.period != period {
            self.period = period;
            self.current_period_points = 0;
        }
        if in_period {
            self.current_period_points += points;
        }
        self.lifetime_points += points;
        self.updated_at = at;
    }
}

/// Outcome of recomputing one ledger row from its submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRebuild {
    /// Stored figures as seen from the rebuild period, zero if no row existed
    pub old: LedgerTotals,
    pub new: LedgerTotals,
    /// Whether the stored row was replaced
    pub rewritten: bool,
}

impl LedgerRebuild {
    /// Compare the stored row against freshly computed totals.
    ///
    /// A row from an older period is rewritten even when its figures agree,
    /// but that alone is not a correction.
    pub fn compare(existing: Option<&LedgerRow>, period: CalendarMonth, new: LedgerTotals) -> Self {
        let old = existing.map(|row| row.totals_for(period)).unwrap_or_default();
        let stale = existing.map_or(true, |row| row.period != period);
        Self {
            old,
            new,
            rewritten: old != new || stale,
        }
    }

    pub fn is_correction(&self) -> bool {
        self.old != self.new
    }
}

impl fmt::Display for LedgerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pts in {}, {} lifetime, {} month streak ({})",
            self.ambassador_id,
            self.current_period_points,
            self.period,
            self.lifetime_points,
            self.consecutive_months,
            self.reward_tier
        )
    }
}
