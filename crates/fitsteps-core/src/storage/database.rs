//! SQLite-based step storage.
//!
//! Provides persistent storage for:
//! - Daily step buckets fetched from the remote API
//! - Key-value metadata (the ingestion watermark lives here)

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::migrations;
use crate::error::DatabaseError;
use crate::forecast::DailySteps;

/// One aggregated bucket as returned by the remote API.
///
/// Unique by `(start_time, end_time)`; never updated once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBucket {
    /// Bucket start, epoch millis (inclusive).
    pub start_time: i64,
    /// Bucket end, epoch millis (exclusive).
    pub end_time: i64,
    pub steps: u64,
}

/// What happened to a single bucket on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same `(start_time, end_time)` already existed.
    Duplicate,
}

/// Aggregate view of the `steps` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSummary {
    pub bucket_count: u64,
    pub total_steps: u64,
    pub first_bucket: Option<DateTime<Utc>>,
    pub last_bucket: Option<DateTime<Utc>>,
}

/// SQLite database for step storage.
///
/// Opened once per process and passed around by reference.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (for tests and throwaway runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert a bucket, silently discarding duplicate keys.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any reason other than a duplicate key.
    pub fn insert_bucket(&self, bucket: &StepBucket) -> Result<InsertOutcome, DatabaseError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO steps (start_time, end_time, steps) VALUES (?1, ?2, ?3)",
            params![bucket.start_time, bucket.end_time, bucket.steps],
        )?;
        Ok(if changed == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    /// All stored buckets ordered by start time.
    pub fn buckets(&self) -> Result<Vec<StepBucket>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT start_time, end_time, steps FROM steps ORDER BY start_time, end_time")?;
        let rows = stmt.query_map([], |row| {
            Ok(StepBucket {
                start_time: row.get(0)?,
                end_time: row.get(1)?,
                steps: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Sum buckets per calendar day, keyed by bucket start in `offset`.
    pub fn daily_totals(&self, offset: FixedOffset) -> Result<Vec<DailySteps>, DatabaseError> {
        let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for bucket in self.buckets()? {
            let Some(start) = DateTime::<Utc>::from_timestamp_millis(bucket.start_time) else {
                tracing::warn!(start_time = bucket.start_time, "bucket start out of range, skipped");
                continue;
            };
            let date = start.with_timezone(&offset).date_naive();
            *per_day.entry(date).or_insert(0) += bucket.steps as i64;
        }
        Ok(per_day
            .into_iter()
            .map(|(date, steps)| DailySteps { date, steps })
            .collect())
    }

    pub fn summary(&self) -> Result<StepSummary, DatabaseError> {
        let (count, total, first, last) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(steps), 0), MIN(start_time), MAX(start_time) FROM steps",
            [],
            |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;
        Ok(StepSummary {
            bucket_count: count,
            total_steps: total,
            first_bucket: first.and_then(DateTime::<Utc>::from_timestamp_millis),
            last_bucket: last.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }

    /// Get a value from the meta store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM meta WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the meta store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn bucket(day: i64, steps: u64) -> StepBucket {
        StepBucket {
            start_time: day * DAY_MS,
            end_time: (day + 1) * DAY_MS,
            steps,
        }
    }

    #[test]
    fn test_insert_ignores_duplicate_keys() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.insert_bucket(&bucket(1, 500)).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.insert_bucket(&bucket(1, 900)).unwrap(), InsertOutcome::Duplicate);

        let stored = db.buckets().unwrap();
        assert_eq!(stored, vec![bucket(1, 500)]);
    }

    #[test]
    fn test_same_start_different_end_is_distinct() {
        let db = Database::open_memory().unwrap();
        db.insert_bucket(&bucket(1, 500)).unwrap();
        let shorter = StepBucket {
            end_time: DAY_MS + 3_600_000,
            ..bucket(1, 20)
        };
        assert_eq!(db.insert_bucket(&shorter).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.buckets().unwrap().len(), 2);
    }

    #[test]
    fn test_daily_totals_group_by_local_date() {
        let db = Database::open_memory().unwrap();
        db.insert_bucket(&bucket(0, 100)).unwrap();
        db.insert_bucket(&StepBucket {
            start_time: 12 * 3_600_000,
            end_time: DAY_MS,
            steps: 50,
        })
        .unwrap();
        db.insert_bucket(&bucket(1, 300)).unwrap();

        let utc = FixedOffset::east_opt(0).unwrap();
        let totals = db.daily_totals(utc).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].date, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(totals[0].steps, 150);
        assert_eq!(totals[1].steps, 300);

        // 12:00 UTC on Jan 1st is already Jan 2nd in UTC+13.
        let far_east = FixedOffset::east_opt(13 * 3600).unwrap();
        let totals = db.daily_totals(far_east).unwrap();
        assert_eq!(totals[0].steps, 100);
        assert_eq!(totals[1].steps, 350);
    }

    #[test]
    fn test_summary_on_empty_table() {
        let db = Database::open_memory().unwrap();
        let summary = db.summary().unwrap();
        assert_eq!(summary.bucket_count, 0);
        assert_eq!(summary.total_steps, 0);
        assert!(summary.first_bucket.is_none());
    }

    #[test]
    fn test_summary_counts_and_bounds() {
        let db = Database::open_memory().unwrap();
        db.insert_bucket(&bucket(3, 10)).unwrap();
        db.insert_bucket(&bucket(1, 5)).unwrap();
        let summary = db.summary().unwrap();
        assert_eq!(summary.bucket_count, 2);
        assert_eq!(summary.total_steps, 15);
        assert_eq!(summary.first_bucket.unwrap().timestamp_millis(), DAY_MS);
        assert_eq!(summary.last_bucket.unwrap().timestamp_millis(), 3 * DAY_MS);
    }

    #[test]
    fn test_kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
    }
}
