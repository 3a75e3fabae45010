//! Read boundary consumed by the external HTTP layer.
//!
//! Point reads only; nothing here mutates a store. Absent data surfaces as
//! `None` rather than an error so the caller can map it to a not-found
//! response.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::models::StatsSummary;
use crate::store::AggregateStore;

pub struct StatsReader {
    cache: Arc<AggregateStore>,
}

impl StatsReader {
    pub fn new(cache: Arc<AggregateStore>) -> Self {
        Self { cache }
    }

    /// Every sensor currently in the cache, projected to the listing shape.
    pub fn list_statistics(&self) -> Result<Vec<StatsSummary>, PipelineError> {
        Ok(self
            .cache
            .all()?
            .into_iter()
            .map(|stats| StatsSummary {
                id: stats.source_id,
                count: stats.count,
                avg_temp: stats.average,
            })
            .collect())
    }

    /// Absolute difference between a sensor's last reading and the reference
    /// reading. `None` when either side has no data yet; an exact 0.0
    /// difference is a present, valid result.
    pub fn difference_from_reference(
        &self,
        sensor_id: &str,
    ) -> Result<Option<f64>, PipelineError> {
        let Some(stats) = self.cache.get(sensor_id)? else {
            return Ok(None);
        };
        let Some(reference) = self.cache.reference_reading()? else {
            return Ok(None);
        };
        Ok(Some((stats.last_value - reference).abs()))
    }

    /// Truthiness-filtering variant kept for consumers whose contract folds a
    /// zero difference into "no data": an exact 0.0 maps to `None` here.
    pub fn nonzero_difference_from_reference(
        &self,
        sensor_id: &str,
    ) -> Result<Option<f64>, PipelineError> {
        Ok(self
            .difference_from_reference(sensor_id)?
            .filter(|diff| *diff != 0.0))
    }
}
