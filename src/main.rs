//! SensorHub - periodic sensor ingestion and running statistics
//!
//! Pulls readings from the configured external sources on fixed cadences,
//! appends every raw reading to the durable log and folds it into the
//! statistics cache through the event bus. Runs until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensorhub_backend::{
    bus::EventBus,
    fetch::Fetcher,
    handlers::{EventLogWriter, ReferenceUpdater, RunningStatsUpdater},
    models::Config,
    scheduler,
    store::{AggregateStore, EventLog},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;

    info!("🚀 SensorHub starting");

    let event_log = Arc::new(EventLog::new(&config.readings_db_path)?);
    let cache = Arc::new(AggregateStore::new(&config.cache_db_path)?);

    info!(
        "📊 Readings log at: {} ({} rows)",
        config.readings_db_path,
        event_log.len()
    );
    info!("📊 Statistics cache at: {}", config.cache_db_path);

    // Registration order matters: a sample is durable in the log before its
    // aggregate becomes visible in the cache.
    let mut sensor_bus = EventBus::new();
    sensor_bus.subscribe(Arc::new(EventLogWriter::new(event_log.clone())));
    sensor_bus.subscribe(Arc::new(RunningStatsUpdater::new(cache.clone())));

    let mut weather_bus = EventBus::new();
    weather_bus.subscribe(Arc::new(ReferenceUpdater::new(cache.clone())));

    let fetcher = Arc::new(Fetcher::new(config.fetch_timeout)?);

    let handles = scheduler::spawn_pollers(
        config.sources.clone(),
        fetcher,
        Arc::new(sensor_bus),
        Arc::new(weather_bus),
    );
    info!("🔄 {} source poll loops running", handles.len());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorhub_backend=debug,sensorhub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
