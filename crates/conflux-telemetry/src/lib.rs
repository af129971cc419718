//! Observability for the Conflux configuration engine.
//!
//! - **Logging**: structured JSON or pretty output through `tracing-subscriber`
//! - **Metrics**: Prometheus-format counters for reads, misses, mutations and
//!   source failures via the `metrics` crate
//!
//! # Example
//!
//! ```rust,ignore
//! use conflux_telemetry::{TelemetryConfig, init_telemetry};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
