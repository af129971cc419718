//! # Conflux
//!
//! **Layered application configuration with runtime mutation**
//!
//! Conflux merges key/value configuration from a bootstrap document, an
//! external properties file and any custom sources into one view:
//!
//! - **Bootstrap identity** – `app.name` and friends decide where the external file lives
//! - **Encrypted values** – `ENC(...)` entries are decrypted on load
//! - **Runtime mutation** – admin mode persists `put`/`delete` to the external file
//! - **Live refresh** – external edits are picked up on `refresh()`
//! - **Observability** – structured `tracing` logs and Prometheus metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conflux::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry(&TelemetryConfig::default())?;
//!
//!     let config = ConfigurationAggregator::builder()
//!         .with_bootstrap_str("app", include_str!("../conflux-app.properties"))
//!         .with_file_provider()
//!         .build();
//!
//!     let port: u16 = config.get_typed("server.port")?;
//!     config.put("feature.enabled", "true")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! bootstrap → identity → [source 1] → [source 2] → ... → merged map
//!                              ↑                             ↓
//!             put/delete → mutable sources (persist first) → map
//! ```

#![doc(html_root_url = "https://docs.rs/conflux/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use conflux_core as core;

// Re-export aggregation types
pub use conflux_config as config;

// Re-export telemetry types
pub use conflux_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use conflux::prelude::*;
///
/// let config = ConfigurationAggregator::builder()
///     .with_system_properties(SystemProperties::new())
///     .with_bootstrap_str("app", "app.name=demo\n")
///     .build();
/// assert_eq!(config.get("app.name").as_deref(), Some("demo"));
/// ```
pub mod prelude {
    pub use conflux_core::{
        ApplicationIdentity, ConfigContext, ConfigResult, ConfigurationError,
        ConfigurationMap, ConfigurationSource, DeleteOutcome, ErrorKind, MutableSource,
        NamingContext, PutOutcome, StaticSource, SystemProperties,
    };

    // Re-export aggregation types
    pub use conflux_config::{
        AggregatorBuilder, BootstrapSource, ConfigurationAggregator, FileBackedProvider,
        FromConfigValue, StaticNamingContext,
    };

    // Re-export telemetry setup
    pub use conflux_telemetry::{init_telemetry, TelemetryConfig};
}
