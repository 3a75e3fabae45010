use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Source id attached to weather samples; the reference reading has no
/// upstream identifier of its own.
pub const WEATHER_SOURCE_ID: &str = "weather";

/// One timestamped reading pulled from an external source.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub source_id: String,
    /// Epoch seconds. Sensor sources report their own capture time; weather
    /// samples carry ingest time since the upstream payload has none.
    pub observed_at: i64,
    pub value: f64,
}

/// Running statistics for one sensor.
///
/// Serialized form is the cache entry layout consumed downstream
/// (`count`/`avg`/`temperature`/`total`); the sensor id is the cache key,
/// not part of the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStats {
    #[serde(skip)]
    pub source_id: String,
    pub count: u64,
    #[serde(rename = "avg")]
    pub average: f64,
    #[serde(rename = "temperature")]
    pub last_value: f64,
    pub total: f64,
}

impl SensorStats {
    pub fn from_first_sample(source_id: &str, value: f64) -> Self {
        Self {
            source_id: source_id.to_string(),
            count: 1,
            average: value,
            last_value: value,
            total: value,
        }
    }

    /// Fold one more reading into the running statistics.
    pub fn apply(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.average = self.total / self.count as f64;
        self.last_value = value;
    }
}

/// Projection of [`SensorStats`] served by the statistics listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub id: String,
    pub count: u64,
    #[serde(rename = "avgTemp")]
    pub avg_temp: f64,
}

/// What kind of payload a source returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sensor,
    Weather,
}

/// One configured external source: where to fetch and how often.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub source_id: String,
    pub endpoint: String,
    pub kind: SourceKind,
    pub cadence: Duration,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub readings_db_path: String,
    pub cache_db_path: String,
    pub sources: Vec<SourceConfig>,
    pub fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let readings_db_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./sensorhub_readings.db".to_string());

        let cache_db_path = std::env::var("STATS_CACHE_PATH")
            .unwrap_or_else(|_| "./sensorhub_cache.db".to_string());

        let sensor_ids: Vec<String> = std::env::var("SENSOR_IDS")
            .unwrap_or_else(|_| "iddqd,abba5".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let sensor_url = std::env::var("SENSOR_DATA_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/sensor/{sensor_id}".to_string());

        let weather_url = std::env::var("WEATHER_DATA_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/weather".to_string());

        let sensor_poll_secs = std::env::var("SENSOR_POLL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        let weather_poll_secs = std::env::var("WEATHER_POLL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let fetch_timeout_secs = std::env::var("EXTERNAL_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let mut sources: Vec<SourceConfig> = sensor_ids
            .iter()
            .map(|id| SourceConfig {
                source_id: id.clone(),
                endpoint: sensor_url.replace("{sensor_id}", id),
                kind: SourceKind::Sensor,
                cadence: Duration::from_secs(sensor_poll_secs),
            })
            .collect();

        sources.push(SourceConfig {
            source_id: WEATHER_SOURCE_ID.to_string(),
            endpoint: weather_url,
            kind: SourceKind::Weather,
            cadence: Duration::from_secs(weather_poll_secs),
        });

        Ok(Self {
            readings_db_path,
            cache_db_path,
            sources,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        })
    }
}
