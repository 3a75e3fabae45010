//! Event-bus consumers wired between the fetchers and the stores.
//!
//! Each handler owns a reference to exactly one store and does exactly one
//! thing with a sample. Failures are reported back to the bus, which logs
//! them without disturbing sibling handlers; nothing here retries.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::SampleHandler;
use crate::error::PipelineError;
use crate::models::Sample;
use crate::store::{AggregateStore, EventLog};

/// Appends every raw sensor sample to the durable readings log.
pub struct EventLogWriter {
    log: Arc<EventLog>,
}

impl EventLogWriter {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl SampleHandler for EventLogWriter {
    fn id(&self) -> &'static str {
        "event-log-writer"
    }

    async fn handle(&self, sample: &Sample) -> Result<(), PipelineError> {
        self.log.append(sample)
    }
}

/// Folds every sensor sample into the running statistics cache.
pub struct RunningStatsUpdater {
    cache: Arc<AggregateStore>,
}

impl RunningStatsUpdater {
    pub fn new(cache: Arc<AggregateStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SampleHandler for RunningStatsUpdater {
    fn id(&self) -> &'static str {
        "running-stats"
    }

    async fn handle(&self, sample: &Sample) -> Result<(), PipelineError> {
        self.cache.apply_sample(&sample.source_id, sample.value)?;
        Ok(())
    }
}

/// Overwrites the reference reading with every weather sample.
pub struct ReferenceUpdater {
    cache: Arc<AggregateStore>,
}

impl ReferenceUpdater {
    pub fn new(cache: Arc<AggregateStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SampleHandler for ReferenceUpdater {
    fn id(&self) -> &'static str {
        "reference-reading"
    }

    async fn handle(&self, sample: &Sample) -> Result<(), PipelineError> {
        self.cache.set_reference_reading(sample.value)
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

    #[tokio::test]
    async fn log_writer_appends_raw_rows() {
        let log = Arc::new(EventLog::new(":memory:").expect("open log"));
        let writer = EventLogWriter::new(log.clone());

        writer.handle(&sample("s1", 100, 10.0)).await.expect("handle");
        writer.handle(&sample("s1", 105, 20.0)).await.expect("handle");

        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn stats_updater_folds_samples() {
        let cache = Arc::new(AggregateStore::new(":memory:").expect("open cache"));
        let updater = RunningStatsUpdater::new(cache.clone());

        updater.handle(&sample("s1", 100, 10.0)).await.expect("handle");
        updater.handle(&sample("s1", 105, 20.0)).await.expect("handle");

        let stats = cache.get("s1").expect("get").expect("entry");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 15.0);
        assert_eq!(stats.last_value, 20.0);
    }

    #[tokio::test]
    async fn reference_updater_overwrites_single_value() {
        let cache = Arc::new(AggregateStore::new(":memory:").expect("open cache"));
        let updater = ReferenceUpdater::new(cache.clone());

        updater.handle(&sample("weather", 100, 19.08)).await.expect("handle");
        updater.handle(&sample("weather", 105, 21.3)).await.expect("handle");

        assert_eq!(cache.reference_reading().expect("read"), Some(21.3));
    }
}
