//! Teardown metrics
//!
//! Counters are emitted through the `metrics` facade. The binary can install a
//! Prometheus recorder and dump the exposition to a text file for a node
//! exporter textfile collector.

use std::path::Path;

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::models::TeardownOutcome;

/// Prometheus metrics recorder
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder (idempotent)
pub fn init_prometheus() -> Result<()> {
    PROMETHEUS_HANDLE
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full("teardown_duration_seconds".to_string()),
                    &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
                )?
                .install_recorder()
        })
        .context("Failed to install Prometheus recorder")?;
    Ok(())
}

/// Write the current exposition to `path`, replacing it atomically
pub fn write_textfile(path: &Path) -> Result<()> {
    let handle = PROMETHEUS_HANDLE
        .get()
        .context("Prometheus recorder not installed")?;

    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())
        .with_context(|| format!("Failed to write metrics to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;

    Ok(())
}

/// Record a finished teardown
pub fn record_outcome(outcome: &TeardownOutcome) {
    let result = if outcome.has_failures() { "failed" } else { "ok" };
    counter!("teardown_runs_total", "result" => result).increment(1);

    for container in &outcome.containers {
        counter!("teardown_containers_total", "status" => container.status.label()).increment(1);
    }

    counter!("teardown_networks_total", "status" => outcome.network.status.label()).increment(1);
    histogram!("teardown_duration_seconds").record(outcome.duration().as_secs_f64());
}
