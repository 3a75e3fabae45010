//! Offline reconciliation between the readings log and the statistics cache.
//!
//! The cache is a derived view that can drift when one of the two event-bus
//! handlers fails and the other succeeds, or when the cache is simply new.
//! This module recomputes the truth from the log and either overwrites the
//! cache (reconcile) or asserts the cache already matches, failing fast on
//! the first divergent field (verify).

use crate::error::PipelineError;
use crate::models::SensorStats;
use crate::store::{AggregateStore, EventLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    /// Overwrite the cache entry for every sensor found in the log.
    Reconcile,
    /// Compare field-by-field and stop at the first mismatch.
    Verify,
}

/// Per-sensor outcome of an audit pass. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub log_derived: SensorStats,
    /// Cache entry as it was before any overwrite; `None` when absent.
    pub cache_derived: Option<SensorStats>,
    pub mismatch: bool,
}

// Recomputed-by-SQL and incrementally-accumulated floats legitimately differ
// in the last ulps; exact comparison would flag healthy stores.
const REL_TOLERANCE: f64 = 1e-9;

fn floats_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn first_divergent_field(
    expected: &SensorStats,
    cached: &SensorStats,
) -> Option<(&'static str, String, String)> {
    if expected.count != cached.count {
        return Some((
            "count",
            expected.count.to_string(),
            cached.count.to_string(),
        ));
    }
    if !floats_match(expected.total, cached.total) {
        return Some(("total", expected.total.to_string(), cached.total.to_string()));
    }
    if !floats_match(expected.average, cached.average) {
        return Some((
            "average",
            expected.average.to_string(),
            cached.average.to_string(),
        ));
    }
    if !floats_match(expected.last_value, cached.last_value) {
        return Some((
            "last_value",
            expected.last_value.to_string(),
            cached.last_value.to_string(),
        ));
    }
    None
}

/// Run one audit pass over every sensor present in the readings log.
///
/// In verify mode the first divergence (including an entry missing from the
/// cache) aborts the run with a [`PipelineError::ConsistencyViolation`]
/// naming the sensor and the field.
pub fn run(
    log: &EventLog,
    cache: &AggregateStore,
    mode: AuditMode,
) -> Result<Vec<AuditReport>, PipelineError> {
    let recomputed = log.aggregate_by_source()?;
    let mut reports = Vec::with_capacity(recomputed.len());

    for expected in recomputed {
        let current = cache.get(&expected.source_id)?;

        let divergence = match &current {
            Some(cached) => first_divergent_field(&expected, cached),
            None => Some(("entry", "present".to_string(), "absent".to_string())),
        };

        match mode {
            AuditMode::Reconcile => {
                cache.set(&expected)?;
            }
            AuditMode::Verify => {
                if let Some((field, log_value, cache_value)) = divergence.clone() {
                    return Err(PipelineError::ConsistencyViolation {
                        source_id: expected.source_id.clone(),
                        field,
                        expected: log_value,
                        actual: cache_value,
                    });
                }
            }
        }

        reports.push(AuditReport {
            mismatch: divergence.is_some(),
            log_derived: expected,
            cache_derived: current,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;

    fn seeded_log() -> EventLog {
        let log = EventLog::new(":memory:").expect("open log");
        for (id, observed_at, value) in [("s1", 100, 10.0), ("s1", 105, 20.0)] {
            log.append(&Sample {
                source_id: id.to_string(),
                observed_at,
                value,
            })
            .expect("append");
        }
        log
    }

    #[test]
    fn reconcile_overwrites_cache_from_log() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");

        let reports = run(&log, &cache, AuditMode::Reconcile).expect("audit");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].mismatch);

        let stats = cache.get("s1").expect("get").expect("entry");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, 30.0);
        assert_eq!(stats.average, 15.0);
        assert_eq!(stats.last_value, 20.0);
    }

    #[test]
    fn reconcile_replaces_drifted_entries() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");
        // Simulates the stats handler missing one delivery.
        cache.apply_sample("s1", 10.0).expect("apply");

        run(&log, &cache, AuditMode::Reconcile).expect("audit");

        let stats = cache.get("s1").expect("get").expect("entry");
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn verify_passes_on_matching_cache() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");
        cache.apply_sample("s1", 10.0).expect("apply");
        cache.apply_sample("s1", 20.0).expect("apply");

        let reports = run(&log, &cache, AuditMode::Verify).expect("audit");
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].mismatch);
    }

    #[test]
    fn verify_names_sensor_and_field_on_count_drift() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");
        cache.apply_sample("s1", 20.0).expect("apply");

        let err = run(&log, &cache, AuditMode::Verify).unwrap_err();
        match err {
            PipelineError::ConsistencyViolation {
                source_id, field, ..
            } => {
                assert_eq!(source_id, "s1");
                assert_eq!(field, "count");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn verify_treats_missing_entry_as_violation() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");

        let err = run(&log, &cache, AuditMode::Verify).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ConsistencyViolation { ref field, .. } if *field == "entry"
        ));
    }

    #[test]
    fn verify_does_not_mutate_the_cache() {
        let log = seeded_log();
        let cache = AggregateStore::new(":memory:").expect("open cache");

        let _ = run(&log, &cache, AuditMode::Verify);
        assert_eq!(cache.get("s1").expect("get"), None);
    }
}
