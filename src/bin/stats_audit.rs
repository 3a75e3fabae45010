//! Statistics Audit Tool
//!
//! Recomputes per-sensor running statistics from the readings log and either
//! rewrites the statistics cache (the default, a "hard reset" useful for
//! initializing a fresh cache or recovering from drift) or checks that the
//! cache already agrees with the log.
//!
//! Usage:
//!   cargo run --bin stats-audit
//!   cargo run --bin stats-audit -- --health-check
//!   cargo run --bin stats-audit -- --db-path ./readings.db --cache-path ./cache.db

use anyhow::{Context, Result};
use clap::Parser;

use sensorhub_backend::{
    audit::{self, AuditMode},
    models::Config,
    store::{AggregateStore, EventLog},
};

/// Rebuild or verify the running-statistics cache from the readings log
#[derive(Parser, Debug)]
#[command(name = "stats-audit")]
#[command(about = "Recompute per-sensor statistics from the readings log")]
struct Cli {
    /// Path to the readings log database (defaults to DATABASE_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Path to the statistics cache database (defaults to STATS_CACHE_PATH)
    #[arg(long)]
    cache_path: Option<String>,

    /// Check the cache against the log instead of rewriting it; exits
    /// non-zero on the first mismatch
    #[arg(long)]
    health_check: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    let db_path = cli.db_path.unwrap_or(config.readings_db_path);
    let cache_path = cli.cache_path.unwrap_or(config.cache_db_path);

    let event_log = EventLog::new(&db_path)
        .with_context(|| format!("Failed to open readings log at {db_path}"))?;
    let cache = AggregateStore::new(&cache_path)
        .with_context(|| format!("Failed to open statistics cache at {cache_path}"))?;

    let mode = if cli.health_check {
        AuditMode::Verify
    } else {
        AuditMode::Reconcile
    };

    let reports = audit::run(&event_log, &cache, mode)?;

    if reports.is_empty() {
        println!("No readings recorded yet, nothing to audit");
        return Ok(());
    }

    for report in &reports {
        let stats = &report.log_derived;
        if cli.health_check {
            println!("Data for {} is up to date", stats.source_id);
        } else {
            println!(
                "{}: count={} avg={} total={} last={} {}",
                stats.source_id,
                stats.count,
                stats.average,
                stats.total,
                stats.last_value,
                if report.mismatch {
                    "(rewritten)"
                } else {
                    "(already current)"
                }
            );
        }
    }

    Ok(())
}
