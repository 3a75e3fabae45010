//! Append-only log of raw readings.
//!
//! Every sample accepted by the event bus lands here unmodified. This log is
//! the ground truth for the statistics cache: `aggregate_by_source` recomputes
//! the running statistics the cache should contain, and the audit tool uses
//! that to rebuild or verify the cache (see `crate::audit`).

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::PipelineError;
use crate::models::{Sample, SensorStats};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS readings (
    source_id   TEXT NOT NULL,
    observed_at INTEGER NOT NULL,
    value       REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_readings_source_time
    ON readings(source_id, observed_at DESC);
"#;

/// Durable store of every raw reading ever received.
pub struct EventLog {
    conn: Arc<Mutex<Connection>>,
}

impl EventLog {
    pub fn new(db_path: &str) -> Result<Self, PipelineError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert one immutable row. Rows are never updated or deleted.
    pub fn append(&self, sample: &Sample) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO readings (source_id, observed_at, value) VALUES (?1, ?2, ?3)",
            params![sample.source_id, sample.observed_at, sample.value],
        )?;
        Ok(())
    }

    /// Recompute running statistics for every source present in the log.
    ///
    /// `last_value` comes from the row with the greatest `observed_at`, not
    /// from insertion order: concurrent writers can interleave inserts, so
    /// rowid order is only used to break exact-timestamp ties (later insert
    /// wins).
    pub fn aggregate_by_source(&self) -> Result<Vec<SensorStats>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT source_id, COUNT(*), SUM(value), AVG(value),
                    (SELECT value FROM readings newest
                     WHERE newest.source_id = r.source_id
                     ORDER BY newest.observed_at DESC, newest.rowid DESC
                     LIMIT 1)
             FROM readings r
             GROUP BY source_id
             ORDER BY source_id",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(SensorStats {
                    source_id: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    total: row.get(2)?,
                    average: row.get(3)?,
                    last_value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    /// Number of readings recorded so far.
    pub fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM readings", [], |row| {
            row.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, observed_at: i64, value: f64) -> Sample {
        Sample {
            source_id: id.to_string(),
            observed_at,
            value,
        }
    }

    #[test]
    fn append_and_count() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        assert!(log.is_empty());

        log.append(&sample("s1", 100, 10.0)).expect("append");
        log.append(&sample("s1", 105, 20.0)).expect("append");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn aggregates_count_total_average_and_latest() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        log.append(&sample("s1", 100, 10.0)).expect("append");
        log.append(&sample("s1", 105, 20.0)).expect("append");

        let stats = log.aggregate_by_source().expect("aggregate");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].source_id, "s1");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].total, 30.0);
        assert_eq!(stats[0].average, 15.0);
        assert_eq!(stats[0].last_value, 20.0);
    }

    #[test]
    fn latest_follows_observed_at_not_insertion_order() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        // Later reading inserted first, as racing writers can do.
        log.append(&sample("s1", 200, 42.0)).expect("append");
        log.append(&sample("s1", 100, 7.0)).expect("append");

        let stats = log.aggregate_by_source().expect("aggregate");
        assert_eq!(stats[0].last_value, 42.0);
    }

    #[test]
    fn equal_timestamps_resolve_to_later_insert() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        log.append(&sample("s1", 100, 1.0)).expect("append");
        log.append(&sample("s1", 100, 2.0)).expect("append");

        let stats = log.aggregate_by_source().expect("aggregate");
        assert_eq!(stats[0].last_value, 2.0);
    }

    #[test]
    fn groups_by_source() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        log.append(&sample("abba5", 100, 1.0)).expect("append");
        log.append(&sample("iddqd", 101, 2.0)).expect("append");
        log.append(&sample("iddqd", 102, 4.0)).expect("append");

        let stats = log.aggregate_by_source().expect("aggregate");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].source_id, "abba5");
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[1].source_id, "iddqd");
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].average, 3.0);
    }

    #[test]
    fn empty_log_aggregates_to_nothing() {
        let log = EventLog::new(":memory:").expect("Failed to open log");
        assert!(log.aggregate_by_source().expect("aggregate").is_empty());
    }
}
