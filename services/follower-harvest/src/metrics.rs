//! Prometheus metrics exposition
//!
//! Counters emitted by the library crates:
//!
//! - `harvest_pool_acquisitions_total` (counter): accounts leased by the rotator
//! - `harvest_pool_releases_total` (counter): label `outcome`
//! - `harvest_pages_total` (counter): follower pages fetched
//! - `harvest_followers_total` (counter): unique followers collected
//!
//! A CLI run has no scrape endpoint, so the rendered exposition is written to
//! a file at exit for the node-exporter textfile collector.

use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    describe();
    Ok(handle)
}

/// Register help text for every counter the run emits.
pub fn describe() {
    metrics::describe_counter!(
        "harvest_pool_acquisitions_total",
        "Accounts leased from the rotator"
    );
    metrics::describe_counter!(
        "harvest_pool_releases_total",
        "Leases returned to the rotator, by request outcome"
    );
    metrics::describe_counter!("harvest_pages_total", "Follower pages fetched");
    metrics::describe_counter!("harvest_followers_total", "Unique followers collected");
}

/// Write the current exposition to `path`.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    std::fs::write(path, handle.render())
        .with_context(|| format!("failed to write metrics to {}", path.display()))
}
