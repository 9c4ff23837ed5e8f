//! Logging and metrics setup for the binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_METRICS_DUMP_PATH: &str = "METRICS_DUMP_PATH";

/// Global subscriber: `RUST_LOG` filter (default `info`), compact lines, or JSON
/// when `LOG_FORMAT=json`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Install the Prometheus recorder and describe every metric the pipeline emits.
pub fn install_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    crate::ingest::ensure_metrics_described();
    describe_run_metrics();
    Ok(handle)
}

fn describe_run_metrics() {
    describe_counter!(
        "sentiment_scored_total",
        "Records passed through the scorer, by outcome."
    );
    describe_counter!("batch_tickers_total", "Tickers finished, by status.");
    describe_counter!("persist_rows_total", "News rows appended to the partition file.");
    describe_counter!("persist_failures_total", "Failed writes of news rows or bars.");
    describe_gauge!("batch_last_run_ts", "Unix time the last batch finished.");
}

/// Write the exposition text to `$METRICS_DUMP_PATH`, if set. Returns the path written.
pub fn dump_metrics(handle: &PrometheusHandle) -> Result<Option<PathBuf>> {
    let Some(path) = std::env::var_os(ENV_METRICS_DUMP_PATH).map(PathBuf::from) else {
        return Ok(None);
    };
    std::fs::write(&path, handle.render())
        .with_context(|| format!("writing metrics to {}", path.display()))?;
    Ok(Some(path))
}
