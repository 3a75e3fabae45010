//! Fixed-cadence trigger for the fetchers.
//!
//! One interval timeline per configured source, each running in its own
//! task; a slow fetch for one source never delays ticks for the others.
//! Every tick spawns the fetch-and-publish as a fresh task with no overlap
//! guard, so a new fetch for a source may start before the previous one has
//! completed. The aggregate store serializes its per-key updates, so
//! overlapping deliveries cannot lose increments.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::bus::EventBus;
use crate::fetch::Fetcher;
use crate::models::{SourceConfig, SourceKind};

/// Spawn one poll loop per configured source. Sensor samples fan out on
/// `sensor_bus`, weather samples on `weather_bus`.
pub fn spawn_pollers(
    sources: Vec<SourceConfig>,
    fetcher: Arc<Fetcher>,
    sensor_bus: Arc<EventBus>,
    weather_bus: Arc<EventBus>,
) -> Vec<JoinHandle<()>> {
    sources
        .into_iter()
        .map(|source| {
            let bus = match source.kind {
                SourceKind::Sensor => sensor_bus.clone(),
                SourceKind::Weather => weather_bus.clone(),
            };
            tokio::spawn(run_source_loop(source, fetcher.clone(), bus))
        })
        .collect()
}

async fn run_source_loop(source: SourceConfig, fetcher: Arc<Fetcher>, bus: Arc<EventBus>) {
    info!(
        source = %source.source_id,
        cadence_secs = source.cadence.as_secs(),
        "⏱ poll loop started"
    );

    let mut ticker = interval(source.cadence);
    loop {
        ticker.tick().await;

        let source = source.clone();
        let fetcher = fetcher.clone();
        let bus = bus.clone();
        tokio::spawn(async move {
            poll_once(&source, &fetcher, &bus).await;
        });
    }
}

/// Fetch one reading and fan it out. A failed fetch ends here: it is logged
/// and publishes nothing.
pub async fn poll_once(source: &SourceConfig, fetcher: &Fetcher, bus: &EventBus) {
    match fetcher.fetch(source).await {
        Ok(sample) => {
            debug!(source = %sample.source_id, value = sample.value, "sample fetched");
            bus.publish(&sample).await;
        }
        Err(e) => {
            error!(source = %source.source_id, error = %e, "fetch failed");
        }
    }
}
