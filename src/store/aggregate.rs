//! Non-expiring key-value cache of running per-sensor statistics, plus the
//! single latest reference reading.
//!
//! This store is a derived view and may lag the readings log, which stays
//! the ground truth. Entries are JSON blobs in the layout the read boundary
//! consumes; writes are last-write-wins per key. The store lives in its own
//! database file, separate from the log, and no transaction ever spans both
//! files; the audit tool exists to repair divergence between them.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::PipelineError;
use crate::models::SensorStats;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS sensor_stats (
    sensor_id  TEXT PRIMARY KEY,
    stats_json TEXT NOT NULL
) WITHOUT ROWID;

-- Single-row table: the latest externally observed reference value.
CREATE TABLE IF NOT EXISTS reference_reading (
    id    INTEGER PRIMARY KEY CHECK (id = 0),
    value REAL NOT NULL
);
"#;

/// Low-latency store of `sensor_id -> SensorStats`, no expiration.
pub struct AggregateStore {
    conn: Arc<Mutex<Connection>>,
}

impl AggregateStore {
    pub fn new(db_path: &str) -> Result<Self, PipelineError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn get(&self, sensor_id: &str) -> Result<Option<SensorStats>, PipelineError> {
        let conn = self.conn.lock();
        Self::get_locked(&conn, sensor_id)
    }

    /// Overwrite the entry for `stats.source_id` (last write wins).
    pub fn set(&self, stats: &SensorStats) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        Self::set_locked(&conn, stats)
    }

    /// Fold one sample value into the running statistics for `sensor_id`,
    /// creating the entry on the first sample.
    ///
    /// The read-modify-write runs entirely under the store mutex: concurrent
    /// calls for the same sensor are serialized and neither increment is
    /// lost.
    pub fn apply_sample(
        &self,
        sensor_id: &str,
        value: f64,
    ) -> Result<SensorStats, PipelineError> {
        let conn = self.conn.lock();
        let stats = match Self::get_locked(&conn, sensor_id)? {
            Some(mut stats) => {
                stats.apply(value);
                stats
            }
            None => SensorStats::from_first_sample(sensor_id, value),
        };
        Self::set_locked(&conn, &stats)?;
        Ok(stats)
    }

    /// Every entry currently in the cache, ordered by sensor id.
    pub fn all(&self) -> Result<Vec<SensorStats>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT sensor_id, stats_json FROM sensor_stats ORDER BY sensor_id",
        )?;

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let sensor_id: String = row.get(0)?;
            let json: String = row.get(1)?;
            let mut stats: SensorStats = serde_json::from_str(&json)?;
            stats.source_id = sensor_id;
            out.push(stats);
        }
        Ok(out)
    }

    /// Overwrite the reference reading (single value, no history).
    pub fn set_reference_reading(&self, value: f64) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reference_reading (id, value) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET value = excluded.value",
            params![value],
        )?;
        Ok(())
    }

    pub fn reference_reading(&self) -> Result<Option<f64>, PipelineError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM reference_reading WHERE id = 0", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn get_locked(
        conn: &Connection,
        sensor_id: &str,
    ) -> Result<Option<SensorStats>, PipelineError> {
        let mut stmt =
            conn.prepare_cached("SELECT stats_json FROM sensor_stats WHERE sensor_id = ?1")?;
        let json: Option<String> = stmt
            .query_row([sensor_id], |row| row.get(0))
            .optional()?;

        match json {
            Some(json) => {
                let mut stats: SensorStats = serde_json::from_str(&json)?;
                stats.source_id = sensor_id.to_string();
                Ok(Some(stats))
            }
            None => Ok(None),
        }
    }

    fn set_locked(conn: &Connection, stats: &SensorStats) -> Result<(), PipelineError> {
        let json = serde_json::to_string(stats)?;
        conn.execute(
            "INSERT INTO sensor_stats (sensor_id, stats_json) VALUES (?1, ?2)
             ON CONFLICT(sensor_id) DO UPDATE SET stats_json = excluded.stats_json",
            params![stats.source_id, json],
        )?;
        Ok(())
    }
}
