//! Layered, file-backed configuration for Conflux.
//!
//! This crate merges key/value configuration from several sources into one
//! in-memory view:
//!
//! - a bootstrap properties document that names the application
//! - an external properties file located through a system property or the
//!   naming registry, with optional `ENC(...)` encrypted values
//! - any number of custom [`ConfigurationSource`](conflux_core::ConfigurationSource)s
//!
//! In admin mode, entries can be added, updated and deleted at runtime; the
//! change is written back to the external file before it becomes visible.
//!
//! # Example
//!
//! ```no_run
//! use conflux_config::ConfigurationAggregator;
//! use conflux_core::SystemProperties;
//!
//! let aggregator = ConfigurationAggregator::builder()
//!     .with_bootstrap_str(
//!         "demo",
//!         "app.name=demo\napp.props.admin.enabled=true\n",
//!     )
//!     .with_system_properties(SystemProperties::new().with("demo.config.dir", "/etc/demo"))
//!     .with_file_provider()
//!     .build();
//!
//! let greeting = aggregator.get("greeting");
//! aggregator.put("greeting", "hi")?;
//! # Ok::<(), conflux_core::ConfigurationError>(())
//! ```
//!
//! # External File Layout
//!
//! ```text
//! # -- property: greeting was added or updated at runtime on: 2024-05-01T10:00:00+00:00
//! db.password=ENC(3q2+7w...)
//! greeting=hi
//! ```
//!
//! # Locating the External File
//!
//! The directory comes from `-D<app>.config.dir` (here, a
//! [`SystemProperties`](conflux_core::SystemProperties) entry or the
//! `<APP>_CONFIG_DIR` environment variable), falling back to the naming key
//! `java:global/jbeans/<app>/ENVIRONMENT_PROPERTIES_PATH`. See [`resolver`].

pub mod aggregator;
pub mod bootstrap;
pub mod builder;
pub mod crypto;
pub mod naming;
pub mod properties;
pub mod provider;
pub mod resolver;
pub mod typed;

pub use aggregator::{ConfigurationAggregator, DEBUG_KEY};
pub use bootstrap::{BootstrapSource, DEFAULT_BOOTSTRAP_FILE};
pub use builder::AggregatorBuilder;
pub use crypto::{encrypt_value, CryptoError, ValueCipher};
pub use naming::StaticNamingContext;
pub use provider::FileBackedProvider;
pub use resolver::{resolve_location, LocationOrigin, ResolvedLocation};
pub use typed::FromConfigValue;
