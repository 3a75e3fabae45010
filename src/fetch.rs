//! One-shot fetchers for the external sensor and weather sources.
//!
//! A fetch either yields exactly one typed [`Sample`] or an error classified
//! as `Request` (network failure, timeout, non-ok status) or `Parse` (body
//! does not match the source schema). Callers log failures and move on; the
//! next scheduled tick is the retry mechanism.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::models::{Sample, SourceConfig, SourceKind};

/// Sensor source payload, consumed verbatim.
#[derive(Debug, Deserialize)]
struct SensorResponse {
    id: String,
    timestamp: i64,
    data: f64,
}

/// Weather source payload, consumed verbatim.
#[derive(Debug, Deserialize)]
struct WeatherResponse {
    temperature: f64,
}

/// HTTP fetcher shared by all source poll loops (pooled connections).
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Pull one reading from a configured source, dispatching on its kind.
    pub async fn fetch(&self, source: &SourceConfig) -> Result<Sample, PipelineError> {
        let body = self.get_body(source).await?;
        match source.kind {
            SourceKind::Sensor => parse_sensor_body(&source.source_id, &body),
            SourceKind::Weather => parse_weather_body(&source.source_id, &body),
        }
    }

    async fn get_body(&self, source: &SourceConfig) -> Result<String, PipelineError> {
        let response = self
            .client
            .get(&source.endpoint)
            .send()
            .await
            .map_err(|e| PipelineError::Request {
                source_id: source.source_id.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Request {
                source_id: source.source_id.clone(),
                reason: format!("status {status}"),
            });
        }

        response.text().await.map_err(|e| PipelineError::Request {
            source_id: source.source_id.clone(),
            reason: e.to_string(),
        })
    }
}

/// The sample carries the id the source reports, which is authoritative over
/// the configured one.
fn parse_sensor_body(source_id: &str, body: &str) -> Result<Sample, PipelineError> {
    let parsed: SensorResponse =
        serde_json::from_str(body).map_err(|e| PipelineError::Parse {
            source_id: source_id.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Sample {
        source_id: parsed.id,
        observed_at: parsed.timestamp,
        value: parsed.data,
    })
}

fn parse_weather_body(source_id: &str, body: &str) -> Result<Sample, PipelineError> {
    let parsed: WeatherResponse =
        serde_json::from_str(body).map_err(|e| PipelineError::Parse {
            source_id: source_id.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Sample {
        source_id: source_id.to_string(),
        observed_at: Utc::now().timestamp(),
        value: parsed.temperature,
    })
}
