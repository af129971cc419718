//! The configuration aggregator.
//!
//! [`ConfigurationAggregator`] merges the bootstrap and every registered
//! source into one key/value map, answers reads from it, and routes runtime
//! mutations to the sources that can persist them.
//!
//! # Merge order
//!
//! Bootstrap entries go in first, then each source in registration order.
//! Later writers win and keys are never pruned, so a refresh only adds or
//! overwrites.
//!
//! # Concurrency
//!
//! Reads are lock-free per key. Initialization runs once, even under
//! concurrent first access. Mutations are serialized so the file and the
//! in-memory map apply them in the same order, and a source is never read
//! and merged while a mutation is in flight.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use conflux_core::{
    ApplicationIdentity, ConfigContext, ConfigResult, ConfigurationError, ConfigurationMap,
    ConfigurationSource, DeleteOutcome, MutableSource, PutOutcome,
};
use conflux_telemetry::metrics;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::bootstrap::BootstrapSource;
use crate::builder::AggregatorBuilder;
use crate::crypto;
use crate::typed::{self, FromConfigValue};

/// Key written by [`ConfigurationAggregator::set_debug`].
pub const DEBUG_KEY: &str = "debug";

/// Merged view over the bootstrap and all registered sources.
///
/// Build one with [`ConfigurationAggregator::builder`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use conflux_config::ConfigurationAggregator;
/// use conflux_core::StaticSource;
///
/// let aggregator = ConfigurationAggregator::builder()
///     .with_bootstrap_str("app", "app.name=demo\n")
///     .with_source(Arc::new(StaticSource::from_pairs("defaults", [("pool.size", "8")])))
///     .build();
///
/// assert_eq!(aggregator.get("pool.size").as_deref(), Some("8"));
/// assert_eq!(aggregator.get_typed::<u32>("pool.size").unwrap(), 8);
/// assert!(aggregator.get("missing").is_none());
/// ```
pub struct ConfigurationAggregator {
    context: Arc<ConfigContext>,
    bootstrap: Option<BootstrapSource>,
    sources: Vec<Arc<dyn ConfigurationSource>>,
    mutable_sources: Vec<Arc<dyn MutableSource>>,
    configuration: DashMap<String, String>,
    unconfigured: DashSet<String>,
    initialized: OnceLock<Option<ConfigurationError>>,
    mutation_lock: Mutex<()>,
}

impl ConfigurationAggregator {
    /// Starts building an aggregator.
    #[must_use]
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::new()
    }

    pub(crate) fn from_parts(
        context: Arc<ConfigContext>,
        bootstrap: Option<BootstrapSource>,
        sources: Vec<Arc<dyn ConfigurationSource>>,
        mutable_sources: Vec<Arc<dyn MutableSource>>,
    ) -> Self {
        Self {
            context,
            bootstrap,
            sources,
            mutable_sources,
            configuration: DashMap::new(),
            unconfigured: DashSet::new(),
            initialized: OnceLock::new(),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Loads the bootstrap, establishes the identity and merges all sources.
    ///
    /// Runs at most once; later calls return the first outcome. Every other
    /// operation calls this implicitly.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error (`BootstrapUnreadable` or
    /// `MissingApplicationIdentity`). Source failures are not errors here;
    /// the failing source simply contributes nothing.
    pub fn initialize(&self) -> Result<(), &ConfigurationError> {
        self.initialized
            .get_or_init(|| self.run_initialization())
            .as_ref()
            .map_or(Ok(()), Err)
    }

    /// Returns `true` once initialization has run, successfully or not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    fn run_initialization(&self) -> Option<ConfigurationError> {
        if let Some(bootstrap) = &self.bootstrap {
            let entries = match bootstrap.load() {
                Ok(entries) => entries,
                Err(err) => {
                    error!(
                        origin = %bootstrap.origin(),
                        error = %err,
                        "failed to load bootstrap properties"
                    );
                    return Some(err);
                }
            };

            for (key, value) in &entries {
                self.configuration
                    .insert(key.clone(), value.trim().to_string());
            }

            match ApplicationIdentity::from_bootstrap(&entries) {
                Ok(identity) => {
                    self.context.establish_identity(identity);
                }
                Err(err) if self.context.identity().is_none() => {
                    error!(
                        origin = %bootstrap.origin(),
                        error = %err,
                        "bootstrap does not name the application"
                    );
                    return Some(err);
                }
                Err(_) => {}
            }
        }

        let Some(identity) = self.context.identity() else {
            error!("no bootstrap and no application identity configured");
            return Some(ConfigurationError::MissingApplicationIdentity);
        };

        info!(
            application = %identity.name,
            sources = self.sources.len(),
            "initializing configuration"
        );
        self.merge_sources();
        None
    }

    /// Consults every source in registration order and merges the results.
    ///
    /// A failing source is logged, counted, and skipped. Returns the number
    /// of sources that failed.
    ///
    /// Each contribution is read and merged under the mutation lock, so a
    /// concurrent [`put`](Self::put) or [`delete`](Self::delete) lands either
    /// before the read or after the merge.
    pub fn merge_sources(&self) -> usize {
        let mut failures = 0;

        for source in &self.sources {
            let _guard = self.mutation_lock.lock();
            match source.contribute() {
                Ok(fragment) => {
                    debug!(source = source.name(), entries = fragment.len(), "merging source");
                    for (key, value) in fragment {
                        self.configuration.insert(key, value);
                    }
                }
                Err(err) => {
                    failures += 1;
                    error!(
                        source = source.name(),
                        kind = err.kind().code(),
                        error = %err,
                        "configuration source failed; contribution skipped"
                    );
                    metrics::record_source_failure(source.name(), err.kind().code());
                }
            }
        }

        metrics::record_entries(self.configuration.len());
        failures
    }

    /// Re-merges all sources, picking up external edits.
    ///
    /// Does nothing if initialization failed. Returns the number of sources
    /// that failed.
    pub fn refresh(&self) -> usize {
        if let Err(err) = self.initialize() {
            warn!(error = %err, "refresh skipped; configuration failed to initialize");
            return 0;
        }
        self.merge_sources()
    }

    /// Returns the value for `key`, recording a miss if absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let _ = self.initialize();

        let value = self.configuration.get(key).map(|v| v.value().clone());
        if value.is_none() && self.unconfigured.insert(key.to_string()) {
            debug!(key, "unconfigured key requested");
        }
        metrics::record_read(value.is_some());
        value
    }

    /// Returns the value for `key`, or `default` if absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Returns the value for `key` parsed as `T`; the zero value if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MalformedTypedValue`] if the value is
    /// present but does not parse.
    pub fn get_typed<T: FromConfigValue>(&self, key: &str) -> ConfigResult<T> {
        typed::convert(key, self.get(key).as_deref())
    }

    /// Returns `true` if `key` is configured. Does not record a miss.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let _ = self.initialize();
        self.configuration.contains_key(key)
    }

    /// Snapshot of the whole configuration.
    #[must_use]
    pub fn get_all(&self) -> ConfigurationMap {
        let _ = self.initialize();
        self.configuration
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Snapshot of keys that were requested but not configured.
    #[must_use]
    pub fn unconfigured_keys(&self) -> HashSet<String> {
        self.unconfigured.iter().map(|key| key.key().clone()).collect()
    }

    /// Adds or replaces `key`, persisting it first.
    ///
    /// Returns [`PutOutcome::Rejected`] without touching anything if admin
    /// mode is disabled.
    ///
    /// # Errors
    ///
    /// - `NoMutableSource` if no registered source accepts writes
    /// - the first source error (typically `PersistenceFailed`); the
    ///   in-memory map is left untouched
    pub fn put(&self, key: &str, value: &str) -> ConfigResult<PutOutcome> {
        let _ = self.initialize();

        if !self.is_admin_enabled() {
            warn!(key, "configuration admin disabled; put rejected");
            metrics::record_mutation("put", PutOutcome::Rejected.as_str());
            return Ok(PutOutcome::Rejected);
        }
        if self.mutable_sources.is_empty() {
            metrics::record_mutation("put", "failed");
            return Err(ConfigurationError::NoMutableSource);
        }

        let _guard = self.mutation_lock.lock();
        let mut outcome = PutOutcome::Rejected;
        for source in &self.mutable_sources {
            match source.save(key, value) {
                Ok(saved) => outcome = outcome.merge(saved),
                Err(err) => {
                    error!(
                        source = source.name(),
                        key,
                        error = %err,
                        "failed to persist configuration entry"
                    );
                    metrics::record_mutation("put", "failed");
                    return Err(err);
                }
            }
        }

        let stored = crypto::reveal(self.context.decryption_key(), value)
            .unwrap_or_else(|_| value.to_string());
        self.configuration.insert(key.to_string(), stored);
        info!(key, outcome = %outcome, "configuration entry stored");
        metrics::record_mutation("put", outcome.as_str());
        Ok(outcome)
    }

    /// Removes `key` from persistent storage and from the map.
    ///
    /// Returns [`DeleteOutcome::Rejected`] without touching anything if admin
    /// mode is disabled.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub fn delete(&self, key: &str) -> ConfigResult<DeleteOutcome> {
        let _ = self.initialize();

        if !self.is_admin_enabled() {
            warn!(key, "configuration admin disabled; delete rejected");
            metrics::record_mutation("delete", DeleteOutcome::Rejected.as_str());
            return Ok(DeleteOutcome::Rejected);
        }
        if self.mutable_sources.is_empty() {
            metrics::record_mutation("delete", "failed");
            return Err(ConfigurationError::NoMutableSource);
        }

        let _guard = self.mutation_lock.lock();
        let mut outcome = DeleteOutcome::Rejected;
        for source in &self.mutable_sources {
            match source.delete(key) {
                Ok(deleted) => outcome = outcome.merge(deleted),
                Err(err) => {
                    error!(
                        source = source.name(),
                        key,
                        error = %err,
                        "failed to delete configuration entry"
                    );
                    metrics::record_mutation("delete", "failed");
                    return Err(err);
                }
            }
        }

        if self.configuration.remove(key).is_some() {
            outcome = outcome.merge(DeleteOutcome::Deleted);
        }
        info!(key, outcome = %outcome, "configuration entry removed");
        metrics::record_mutation("delete", outcome.as_str());
        Ok(outcome)
    }

    /// Sets the in-memory `debug` flag. Not persisted.
    pub fn set_debug(&self, enabled: bool) {
        let _ = self.initialize();
        self.configuration
            .insert(DEBUG_KEY.to_string(), enabled.to_string());
        debug!(enabled, "debug flag set");
    }

    /// Returns `true` if any source besides the bootstrap is registered.
    #[must_use]
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Returns the application identity, once established.
    #[must_use]
    pub fn identity(&self) -> Option<&ApplicationIdentity> {
        let _ = self.initialize();
        self.context.identity()
    }

    /// Returns `true` if runtime mutation is permitted.
    #[must_use]
    pub fn is_admin_enabled(&self) -> bool {
        self.identity().is_some_and(|identity| identity.admin_enabled)
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<ConfigContext> {
        &self.context
    }
}
