//! Prometheus metrics for Conflux.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `conflux_config_reads_total` | Counter | - | Key lookups |
//! | `conflux_config_misses_total` | Counter | - | Lookups of unconfigured keys |
//! | `conflux_config_mutations_total` | Counter | `operation`, `outcome` | Put/delete requests |
//! | `conflux_source_failures_total` | Counter | `source`, `kind` | Sources that failed to contribute |
//! | `conflux_config_entries` | Gauge | - | Entries in the aggregate after a merge |
//!
//! Recording functions are safe to call before [`init_metrics`]; the
//! `metrics` facade discards values until a recorder is installed.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Key lookups.
    pub const READS: &str = "conflux_config_reads_total";
    /// Lookups of unconfigured keys.
    pub const MISSES: &str = "conflux_config_misses_total";
    /// Put/delete requests.
    pub const MUTATIONS: &str = "conflux_config_mutations_total";
    /// Failed source contributions.
    pub const SOURCE_FAILURES: &str = "conflux_source_failures_total";
    /// Aggregate size.
    pub const ENTRIES: &str = "conflux_config_entries";
}

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Installs the Prometheus recorder.
///
/// The rendered text is available through [`render_metrics`] for whichever
/// endpoint the embedding application exposes.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(names::READS, "Total number of configuration key lookups");
    describe_counter!(
        names::MISSES,
        "Total number of lookups for keys absent from the configuration"
    );
    describe_counter!(
        names::MUTATIONS,
        "Total configuration put/delete requests by outcome"
    );
    describe_counter!(
        names::SOURCE_FAILURES,
        "Total configuration sources that failed to contribute"
    );
    describe_gauge!(
        names::ENTRIES,
        "Number of entries in the merged configuration"
    );
}

/// Records a key lookup.
pub fn record_read(hit: bool) {
    counter!(names::READS).increment(1);
    if !hit {
        counter!(names::MISSES).increment(1);
    }
}

/// Records a mutation request.
///
/// # Arguments
///
/// * `operation` - "put" or "delete"
/// * `outcome` - e.g. "created", "updated", "rejected", "failed"
pub fn record_mutation(operation: &'static str, outcome: &'static str) {
    counter!(
        names::MUTATIONS,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Records a source that failed to contribute.
pub fn record_source_failure(source: &str, kind: &'static str) {
    counter!(
        names::SOURCE_FAILURES,
        "source" => source.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Records the aggregate size after a merge.
#[allow(clippy::cast_precision_loss)]
pub fn record_entries(count: usize) {
    gauge!(names::ENTRIES).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert!(MetricsConfig::default().enabled);
    }

    #[test]
    fn test_disabled_metrics() {
        assert!(init_metrics(&MetricsConfig { enabled: false }).is_ok());
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_read(true);
        record_read(false);
        record_mutation("put", "created");
        record_source_failure("file:demo.properties", "MISSING_DECRYPTION_KEY");
        record_entries(12);
    }
}
