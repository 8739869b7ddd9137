//! SQLite storage implementation.
//!
//! Duplicate detection is enforced by the schema, not by a read-then-write:
//! - a partial unique index allows one canonical row per
//!   (`ambassador_id`, `fingerprint`)
//! - a unique index on (`ambassador_id`, `fingerprint`, `source_event_id`)
//!   makes re-fetched events no-ops
//!
//! so `INSERT OR IGNORE` is the atomic check-then-insert.
//!
//! Operations that read before they write run in a transaction that takes
//! the write lock first, which serializes them across connections.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Transaction};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::fingerprint::Fingerprint;
use crate::traits::store::{demotions_first, LedgerStore, PointsStore, SubmissionStore, TotalsFn};
use crate::types::{
    ledger::{CalendarMonth, LedgerRebuild, LedgerRow, RewardTier},
    submission::{
        NewSubmission, Reclassification, RecordOutcome, Submission, SubmissionContent,
        SubmissionFilter, SubmissionKind, ValidityStatus,
    },
};

const SUBMISSION_COLUMNS: &str = "id, ambassador_id, kind, fingerprint, content_url, \
     screenshot_filename, screenshot_size, platform, post_type, points_awarded, \
     is_duplicate, validity_status, submitted_at, source_event_id";

/// SQLite-based points store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite://points.db?mode=rwc` - File-based, created if missing
    /// - `sqlite::memory:` - use [`SqliteStore::in_memory`] instead
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(EngineError::store)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Every SQLite connection to `:memory:` is its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(EngineError::store)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                ambassador_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                content_url TEXT,
                screenshot_filename TEXT,
                screenshot_size INTEGER,
                platform TEXT NOT NULL,
                post_type TEXT NOT NULL,
                points_awarded INTEGER NOT NULL,
                is_duplicate INTEGER NOT NULL DEFAULT 0,
                validity_status TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                source_event_id TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_canonical
                ON submissions(ambassador_id, fingerprint) WHERE is_duplicate = 0;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_event
                ON submissions(ambassador_id, fingerprint, source_event_id);
            CREATE INDEX IF NOT EXISTS idx_submissions_credit
                ON submissions(ambassador_id, validity_status, is_duplicate, submitted_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(EngineError::store)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                ambassador_id TEXT PRIMARY KEY,
                period TEXT NOT NULL,
                current_period_points INTEGER NOT NULL DEFAULT 0,
                lifetime_points INTEGER NOT NULL DEFAULT 0,
                consecutive_months INTEGER NOT NULL DEFAULT 0,
                reward_tier TEXT NOT NULL DEFAULT 'none',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(EngineError::store)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(EngineError::store)
    }

    /// Begin a transaction that holds the database write lock from its first
    /// statement, so nothing another connection commits can land between
    /// what it reads and what it writes.
    async fn begin_write(&self, ambassador_id: &str) -> Result<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await.map_err(EngineError::store)?;
        sqlx::query("UPDATE ledger SET updated_at = updated_at WHERE ambassador_id = ?")
            .bind(ambassador_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::store)?;
        Ok(tx)
    }
}

async fn insert_row(conn: &mut SqliteConnection, row: &Submission) -> Result<bool> {
    let (content_url, screenshot_filename, screenshot_size) = match &row.content {
        SubmissionContent::Url { url } => (Some(url.as_str()), None, None),
        SubmissionContent::Screenshot {
            filename,
            byte_size,
        } => (None, Some(filename.as_str()), Some(*byte_size as i64)),
    };

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO submissions (
            id, ambassador_id, kind, fingerprint, content_url,
            screenshot_filename, screenshot_size, platform, post_type, points_awarded,
            is_duplicate, validity_status, submitted_at, source_event_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.ambassador_id)
    .bind(row.kind().as_str())
    .bind(row.fingerprint.as_str())
    .bind(content_url)
    .bind(screenshot_filename)
    .bind(screenshot_size)
    .bind(&row.platform)
    .bind(&row.post_type)
    .bind(row.points_awarded)
    .bind(row.is_duplicate)
    .bind(row.validity_status.as_str())
    .bind(timestamp(row.submitted_at))
    .bind(&row.source_event_id)
    .execute(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    Ok(result.rows_affected() == 1)
}

async fn find_by_event(
    conn: &mut SqliteConnection,
    ambassador_id: &str,
    fingerprint: &Fingerprint,
    source_event_id: &str,
) -> Result<Option<Submission>> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions \
         WHERE ambassador_id = ? AND fingerprint = ? AND source_event_id = ?"
    ))
    .bind(ambassador_id)
    .bind(fingerprint.as_str())
    .bind(source_event_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    row.map(SubmissionRow::into_submission).transpose()
}

async fn find_canonical(
    conn: &mut SqliteConnection,
    ambassador_id: &str,
    fingerprint: &Fingerprint,
) -> Result<Option<Submission>> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions \
         WHERE ambassador_id = ? AND fingerprint = ? AND is_duplicate = 0"
    ))
    .bind(ambassador_id)
    .bind(fingerprint.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    row.map(SubmissionRow::into_submission).transpose()
}

/// Record one candidate. Must run inside a write transaction.
///
/// The canonical insert comes first and takes the write lock, so the
/// follow-up lookups and the duplicate insert see no concurrent writer.
async fn record(conn: &mut SqliteConnection, submission: NewSubmission) -> Result<RecordOutcome> {
    let id = Uuid::now_v7().to_string();
    let canonical_row = submission.clone().into_canonical(id.clone());
    if insert_row(conn, &canonical_row).await? {
        return Ok(RecordOutcome::Accepted(canonical_row));
    }

    // Ignored: either this event was recorded before, or the fingerprint
    // already has a canonical row.
    if let Some(seen) = find_by_event(
        conn,
        &submission.ambassador_id,
        &submission.fingerprint,
        &submission.source_event_id,
    )
    .await?
    {
        return Ok(RecordOutcome::AlreadySeen(seen));
    }

    let canonical = find_canonical(conn, &submission.ambassador_id, &submission.fingerprint)
        .await?
        .ok_or_else(|| {
            EngineError::store(format!(
                "insert ignored but no canonical row for {}",
                submission.fingerprint
            ))
        })?;

    let recorded = submission.into_duplicate(id);
    if !insert_row(conn, &recorded).await? {
        return Err(EngineError::store(format!(
            "duplicate insert ignored for event {}",
            recorded.source_event_id
        )));
    }
    Ok(RecordOutcome::Duplicate {
        recorded,
        canonical,
    })
}

async fn query_submissions(
    conn: &mut SqliteConnection,
    ambassador_id: &str,
    filter: &SubmissionFilter,
) -> Result<Vec<Submission>> {
    let status = filter.validity_status.map(|s| s.as_str());
    let since = filter.since.map(timestamp);
    let until = filter.until.map(timestamp);

    let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
        r#"
        SELECT {SUBMISSION_COLUMNS} FROM submissions
        WHERE ambassador_id = ?
          AND (? IS NULL OR validity_status = ?)
          AND (? IS NULL OR is_duplicate = ?)
          AND (? IS NULL OR submitted_at >= ?)
          AND (? IS NULL OR submitted_at < ?)
        ORDER BY submitted_at, source_event_id
        "#
    ))
    .bind(ambassador_id)
    .bind(status)
    .bind(status)
    .bind(filter.is_duplicate)
    .bind(filter.is_duplicate)
    .bind(since.as_deref())
    .bind(since.as_deref())
    .bind(until.as_deref())
    .bind(until.as_deref())
    .fetch_all(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    rows.into_iter().map(SubmissionRow::into_submission).collect()
}

async fn fetch_ledger(conn: &mut SqliteConnection, ambassador_id: &str) -> Result<Option<LedgerRow>> {
    let row = sqlx::query_as::<_, LedgerRecord>(
        r#"
        SELECT ambassador_id, period, current_period_points, lifetime_points,
               consecutive_months, reward_tier, updated_at
        FROM ledger WHERE ambassador_id = ?
        "#,
    )
    .bind(ambassador_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    row.map(LedgerRecord::into_ledger_row).transpose()
}

async fn credit_ledger(
    conn: &mut SqliteConnection,
    ambassador_id: &str,
    points: i64,
    in_period: bool,
    period: CalendarMonth,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger (ambassador_id, period, current_period_points, lifetime_points, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(ambassador_id) DO UPDATE SET
            current_period_points = CASE
                WHEN ledger.period = excluded.period
                    THEN ledger.current_period_points + excluded.current_period_points
                ELSE excluded.current_period_points
            END,
            lifetime_points = ledger.lifetime_points + excluded.lifetime_points,
            period = excluded.period,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(ambassador_id)
    .bind(period.to_string())
    .bind(if in_period { points } else { 0 })
    .bind(points)
    .bind(timestamp(at))
    .execute(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    Ok(())
}

async fn write_ledger(conn: &mut SqliteConnection, row: &LedgerRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger (
            ambassador_id, period, current_period_points, lifetime_points,
            consecutive_months, reward_tier, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(ambassador_id) DO UPDATE SET
            period = excluded.period,
            current_period_points = excluded.current_period_points,
            lifetime_points = excluded.lifetime_points,
            consecutive_months = excluded.consecutive_months,
            reward_tier = excluded.reward_tier,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.ambassador_id)
    .bind(row.period.to_string())
    .bind(row.current_period_points)
    .bind(row.lifetime_points)
    .bind(i64::from(row.consecutive_months))
    .bind(row.reward_tier.as_str())
    .bind(timestamp(row.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(EngineError::store)?;

    Ok(())
}

/// Fixed-width UTC timestamps, so text order is chronological order.
fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| EngineError::CorruptRow {
            id: id.to_string(),
            reason: format!("invalid date {value}: {e}"),
        })
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: String,
    ambassador_id: String,
    kind: String,
    fingerprint: String,
    content_url: Option<String>,
    screenshot_filename: Option<String>,
    screenshot_size: Option<i64>,
    platform: String,
    post_type: String,
    points_awarded: i64,
    is_duplicate: bool,
    validity_status: String,
    submitted_at: String,
    source_event_id: String,
}

impl SubmissionRow {
    fn into_submission(self) -> Result<Submission> {
        let corrupt = |reason: String| EngineError::CorruptRow {
            id: self.id.clone(),
            reason,
        };

        let content = match SubmissionKind::parse(&self.kind) {
            Some(SubmissionKind::Url) => SubmissionContent::Url {
                url: self
                    .content_url
                    .clone()
                    .ok_or_else(|| corrupt("url row without content_url".into()))?,
            },
            Some(SubmissionKind::Screenshot) => SubmissionContent::Screenshot {
                filename: self
                    .screenshot_filename
                    .clone()
                    .ok_or_else(|| corrupt("screenshot row without filename".into()))?,
                byte_size: self
                    .screenshot_size
                    .and_then(|size| u64::try_from(size).ok())
                    .ok_or_else(|| corrupt("screenshot row without size".into()))?,
            },
            None => return Err(corrupt(format!("unknown kind {}", self.kind))),
        };

        let validity_status = ValidityStatus::parse(&self.validity_status)
            .ok_or_else(|| corrupt(format!("unknown status {}", self.validity_status)))?;
        let submitted_at = parse_timestamp(&self.id, &self.submitted_at)?;

        Ok(Submission {
            id: self.id,
            ambassador_id: self.ambassador_id,
            fingerprint: Fingerprint::from_stored(self.fingerprint),
            content,
            platform: self.platform,
            post_type: self.post_type,
            points_awarded: self.points_awarded,
            is_duplicate: self.is_duplicate,
            validity_status,
            submitted_at,
            source_event_id: self.source_event_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct LedgerRecord {
    ambassador_id: String,
    period: String,
    current_period_points: i64,
    lifetime_points: i64,
    consecutive_months: i64,
    reward_tier: String,
    updated_at: String,
}

impl LedgerRecord {
    fn into_ledger_row(self) -> Result<LedgerRow> {
        let corrupt = |reason: String| EngineError::CorruptRow {
            id: format!("ledger:{}", self.ambassador_id),
            reason,
        };

        let period = CalendarMonth::parse(&self.period)
            .ok_or_else(|| corrupt(format!("invalid period {}", self.period)))?;
        let reward_tier = RewardTier::parse(&self.reward_tier)
            .ok_or_else(|| corrupt(format!("unknown tier {}", self.reward_tier)))?;
        let consecutive_months = u32::try_from(self.consecutive_months)
            .map_err(|_| corrupt(format!("invalid streak {}", self.consecutive_months)))?;
        let updated_at = parse_timestamp(&self.ambassador_id, &self.updated_at)?;

        Ok(LedgerRow {
            ambassador_id: self.ambassador_id,
            period,
            current_period_points: self.current_period_points,
            lifetime_points: self.lifetime_points,
            consecutive_months,
            reward_tier,
            updated_at,
        })
    }
}

#[async_trait]
impl SubmissionStore for SqliteStore {
    async fn record_submission(&self, submission: NewSubmission) -> Result<RecordOutcome> {
        let mut tx = self.begin_write(&submission.ambassador_id).await?;
        let outcome = record(&mut tx, submission).await?;
        tx.commit().await.map_err(EngineError::store)?;
        Ok(outcome)
    }

    async fn find_canonical(
        &self,
        ambassador_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Submission>> {
        find_canonical(&mut *self.acquire().await?, ambassador_id, fingerprint).await
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(EngineError::store)?;

        row.map(SubmissionRow::into_submission).transpose()
    }

    async fn submissions_for(
        &self,
        ambassador_id: &str,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>> {
        query_submissions(&mut *self.acquire().await?, ambassador_id, filter).await
    }

    async fn ambassadors(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT ambassador_id FROM submissions ORDER BY ambassador_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::store)
    }

    async fn reclassify(&self, changes: &[Reclassification]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(EngineError::store)?;
        let mut changed = 0;

        for change in demotions_first(changes) {
            let result = sqlx::query(
                r#"
                UPDATE submissions
                SET is_duplicate = ?, validity_status = ?, points_awarded = ?
                WHERE id = ?
                "#,
            )
            .bind(change.is_duplicate)
            .bind(change.validity_status.as_str())
            .bind(change.points_awarded)
            .bind(&change.submission_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::store)?;

            // Dropping the transaction rolls back anything applied so far
            if result.rows_affected() == 0 {
                return Err(EngineError::CorruptRow {
                    id: change.submission_id.clone(),
                    reason: "reclassified row does not exist".into(),
                });
            }
            changed += 1;
        }

        tx.commit().await.map_err(EngineError::store)?;
        Ok(changed)
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn get_ledger(&self, ambassador_id: &str) -> Result<Option<LedgerRow>> {
        fetch_ledger(&mut *self.acquire().await?, ambassador_id).await
    }

    async fn list_ledger(&self) -> Result<Vec<LedgerRow>> {
        let rows = sqlx::query_as::<_, LedgerRecord>(
            r#"
            SELECT ambassador_id, period, current_period_points, lifetime_points,
                   consecutive_months, reward_tier, updated_at
            FROM ledger
            ORDER BY lifetime_points DESC, ambassador_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::store)?;

        rows.into_iter().map(LedgerRecord::into_ledger_row).collect()
    }

    async fn credit_provisional(
        &self,
        ambassador_id: &str,
        points: i64,
        in_period: bool,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<()> {
        credit_ledger(&mut *self.acquire().await?, ambassador_id, points, in_period, period, at).await
    }

    async fn overwrite_ledger(&self, row: &LedgerRow) -> Result<()> {
        write_ledger(&mut *self.acquire().await?, row).await
    }
}

#[async_trait]
impl PointsStore for SqliteStore {
    async fn record_and_credit(
        &self,
        submission: NewSubmission,
        period: CalendarMonth,
        at: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let mut tx = self.begin_write(&submission.ambassador_id).await?;
        let outcome = record(&mut tx, submission).await?;
        if let RecordOutcome::Accepted(row) = &outcome {
            let (points, in_period) = row.provisional_credit(period);
            credit_ledger(&mut tx, &row.ambassador_id, points, in_period, period, at).await?;
        }
        tx.commit().await.map_err(EngineError::store)?;
        Ok(outcome)
    }

    async fn rebuild_ledger(
        &self,
        ambassador_id: &str,
        period: CalendarMonth,
        at: DateTime<Utc>,
        totals: &TotalsFn,
    ) -> Result<LedgerRebuild> {
        let mut tx = self.begin_write(ambassador_id).await?;
        let credited = query_submissions(&mut tx, ambassador_id, &SubmissionFilter::credited()).await?;
        let existing = fetch_ledger(&mut tx, ambassador_id).await?;

        let new = totals(credited.as_slice());
        let rebuild = LedgerRebuild::compare(existing.as_ref(), period, new);
        if rebuild.rewritten {
            write_ledger(&mut tx, &LedgerRow::new(ambassador_id, period, rebuild.new, at)).await?;
        }
        tx.commit().await.map_err(EngineError::store)?;
        Ok(rebuild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ledger::LedgerTotals;
    use chrono::TimeZone;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    /// A database file shared by a pool of several connections.
    struct FileDb {
        path: std::path::PathBuf,
    }

    impl FileDb {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("points-{}.db", Uuid::new_v4()));
            Self { path }
        }

        async fn open(&self) -> SqliteStore {
            SqliteStore::new(&format!("sqlite://{}?mode=rwc", self.path.display()))
                .await
                .unwrap()
        }
    }

    impl Drop for FileDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
            }
        }
    }

    fn candidate(event_id: &str, content: SubmissionContent, hour: u32) -> NewSubmission {
        NewSubmission {
            ambassador_id: "u1".into(),
            fingerprint: Fingerprint::of("u1", &content),
            content,
            platform: "youtube".into(),
            post_type: "video".into(),
            points_awarded: 15,
            validity_status: ValidityStatus::Accepted,
            submitted_at: Utc.with_ymd_and_hms(2026, 10, 1, hour, 0, 0).unwrap(),
            source_event_id: event_id.into(),
        }
    }

    fn link(url: &str) -> SubmissionContent {
        SubmissionContent::Url { url: url.into() }
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let store = test_store().await;
        let shot = SubmissionContent::Screenshot {
            filename: "proof.png".into(),
            byte_size: 4096,
        };

        let RecordOutcome::Accepted(row) = store
            .record_submission(candidate("m1", shot.clone(), 9))
            .await
            .unwrap()
        else {
            panic!("expected accepted");
        };

        let stored = store.get_submission(&row.id).await.unwrap().unwrap();
        assert_eq!(stored, row);
        assert_eq!(stored.content, shot);
    }

    #[tokio::test]
    async fn test_duplicate_and_refetch() {
        let store = test_store().await;

        let first = store
            .record_submission(candidate("m1", link("youtu.be/a"), 9))
            .await
            .unwrap();
        assert!(matches!(first, RecordOutcome::Accepted(_)));

        let repost = store
            .record_submission(candidate("m2", link("youtu.be/a"), 10))
            .await
            .unwrap();
        let RecordOutcome::Duplicate { recorded, canonical } = repost else {
            panic!("expected duplicate, got {repost:?}");
        };
        assert!(recorded.is_duplicate);
        assert_eq!(recorded.points_awarded, 0);
        assert_eq!(canonical.source_event_id, "m1");

        let refetch = store
            .record_submission(candidate("m2", link("youtu.be/a"), 10))
            .await
            .unwrap();
        assert!(matches!(refetch, RecordOutcome::AlreadySeen(row) if row.id == recorded.id));

        let all = store
            .submissions_for("u1", &SubmissionFilter::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_by_status_and_range() {
        let store = test_store().await;
        store
            .record_submission(candidate("m1", link("youtu.be/a"), 9))
            .await
            .unwrap();
        store
            .record_submission(candidate("m2", link("youtu.be/a"), 10))
            .await
            .unwrap();
        store
            .record_submission(candidate("m3", link("youtu.be/b"), 11))
            .await
            .unwrap();

        let credited = store
            .submissions_for("u1", &SubmissionFilter::credited())
            .await
            .unwrap();
        assert_eq!(credited.len(), 2);

        let morning = SubmissionFilter::credited().between(
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 1, 11, 0, 0).unwrap(),
        );
        let rows = store.submissions_for("u1", &morning).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_event_id, "m1");
    }

    #[tokio::test]
    async fn test_reclassify_swaps_canonical() {
        let store = test_store().await;
        let RecordOutcome::Accepted(first) = store
            .record_submission(candidate("m1", link("youtu.be/a"), 9))
            .await
            .unwrap()
        else {
            panic!("expected accepted");
        };
        let RecordOutcome::Duplicate { recorded: second, .. } = store
            .record_submission(candidate("m0", link("youtu.be/a"), 8))
            .await
            .unwrap()
        else {
            panic!("expected duplicate");
        };

        // Promotion listed first; the store must still demote before promoting
        let changed = store
            .reclassify(&[
                Reclassification {
                    submission_id: second.id.clone(),
                    is_duplicate: false,
                    validity_status: ValidityStatus::Accepted,
                    points_awarded: 15,
                },
                Reclassification::duplicate_of_canonical(&first),
            ])
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let canonical = store
            .find_canonical("u1", &first.fingerprint)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(canonical.id, second.id);
        assert_eq!(canonical.points_awarded, 15);
    }

    #[tokio::test]
    async fn test_ledger_credit_and_overwrite() {
        let store = test_store().await;
        let sept = Utc.with_ymd_and_hms(2026, 9, 30, 12, 0, 0).unwrap();
        let oct = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();

        store
            .credit_provisional("u1", 10, true, CalendarMonth::of(sept), sept)
            .await
            .unwrap();
        store
            .credit_provisional("u1", 4, true, CalendarMonth::of(oct), oct)
            .await
            .unwrap();

        let row = store.get_ledger("u1").await.unwrap().unwrap();
        assert_eq!(row.period, CalendarMonth::of(oct));
        assert_eq!(row.current_period_points, 4);
        assert_eq!(row.lifetime_points, 14);

        let totals = LedgerTotals {
            current_period_points: 1,
            lifetime_points: 2,
            consecutive_months: 3,
            reward_tier: RewardTier::ThreeMonthRecurring,
        };
        let replacement = LedgerRow::new("u1", CalendarMonth::of(oct), totals, oct);
        store.overwrite_ledger(&replacement).await.unwrap();

        let rows = store.list_ledger().await.unwrap();
        assert_eq!(rows, vec![replacement]);
    }

    #[tokio::test]
    async fn test_timestamps_keep_nanoseconds() {
        let store = test_store().await;
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let mut later = candidate("m-a", link("youtu.be/a"), 9);
        later.submitted_at = at + chrono::Duration::nanoseconds(500);
        let mut earlier = candidate("m-b", link("youtu.be/b"), 9);
        earlier.submitted_at = at + chrono::Duration::nanoseconds(100);

        store.record_submission(later.clone()).await.unwrap();
        store.record_submission(earlier.clone()).await.unwrap();

        let rows = store
            .submissions_for("u1", &SubmissionFilter::all())
            .await
            .unwrap();
        assert_eq!(rows[0].source_event_id, "m-b");
        assert_eq!(rows[0].submitted_at, earlier.submitted_at);
        assert_eq!(rows[1].submitted_at, later.submitted_at);
    }

    #[tokio::test]
    async fn test_reclassify_with_missing_row_rolls_back() {
        let store = test_store().await;
        let RecordOutcome::Accepted(row) = store
            .record_submission(candidate("m1", link("youtu.be/a"), 9))
            .await
            .unwrap()
        else {
            panic!("expected accepted");
        };

        let result = store
            .reclassify(&[
                Reclassification::duplicate_of_canonical(&row),
                Reclassification {
                    submission_id: "missing".into(),
                    is_duplicate: true,
                    validity_status: ValidityStatus::Accepted,
                    points_awarded: 0,
                },
            ])
            .await;
        assert!(result.is_err());

        let stored = store.get_submission(&row.id).await.unwrap().unwrap();
        assert!(!stored.is_duplicate);
    }

    #[tokio::test]
    async fn test_record_and_credit_then_rebuild() {
        let store = test_store().await;
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        let period = CalendarMonth::of(at);

        for event_id in ["m1", "m2", "m1"] {
            store
                .record_and_credit(candidate(event_id, link("youtu.be/a"), 9), period, at)
                .await
                .unwrap();
        }
        let row = store.get_ledger("u1").await.unwrap().unwrap();
        assert_eq!((row.current_period_points, row.lifetime_points), (15, 15));

        let doubled = |rows: &[Submission]| LedgerTotals {
            current_period_points: 2 * rows.iter().map(|r| r.points_awarded).sum::<i64>(),
            lifetime_points: 2 * rows.iter().map(|r| r.points_awarded).sum::<i64>(),
            ..LedgerTotals::default()
        };
        let rebuild = store.rebuild_ledger("u1", period, at, &doubled).await.unwrap();
        assert!(rebuild.rewritten);
        assert_eq!(rebuild.old.lifetime_points, 15);
        assert_eq!(rebuild.new.lifetime_points, 30);
        assert_eq!(store.get_ledger("u1").await.unwrap().unwrap().lifetime_points, 30);

        let again = store.rebuild_ledger("u1", period, at, &doubled).await.unwrap();
        assert!(!again.rewritten);
    }

    #[tokio::test]
    async fn test_concurrent_connections_credit_once() {
        let db = FileDb::new();
        let store = std::sync::Arc::new(db.open().await);
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        let period = CalendarMonth::of(at);

        // Distinct events carrying the same post, plus re-fetches of one event
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let event_id = if i % 4 == 0 { "m0".to_string() } else { format!("m{i}") };
            handles.push(tokio::spawn(async move {
                store
                    .record_and_credit(candidate(&event_id, link("youtu.be/race"), 9), period, at)
                    .await
                    .unwrap()
            }));
        }

        let mut accepted = 0;
        let mut duplicates = 0;
        let mut already_seen = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RecordOutcome::Accepted(_) => accepted += 1,
                RecordOutcome::Duplicate { .. } => duplicates += 1,
                RecordOutcome::AlreadySeen(_) => already_seen += 1,
            }
        }
        assert_eq!(accepted, 1);
        // 13 distinct events in total; the 3 extra copies of m0 are re-fetches
        assert_eq!(accepted + duplicates, 13);
        assert_eq!(already_seen, 3);

        let all = store
            .submissions_for("u1", &SubmissionFilter::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 13);
        let ledger = store.get_ledger("u1").await.unwrap().unwrap();
        assert_eq!(ledger.lifetime_points, 15);
    }
}
