//! Configuration source contracts.
//!
//! Anything that contributes key/value pairs to the aggregate implements
//! [`ConfigurationSource`]. Sources that can also persist changes implement
//! [`MutableSource`]; the aggregator keeps those in a separate list and only
//! fans mutations out to them.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

/// A mapping from configuration key to value.
pub type ConfigurationMap = HashMap<String, String>;

/// A contributor of configuration key/value pairs.
///
/// # Example
///
/// ```
/// use conflux_core::{ConfigResult, ConfigurationMap, ConfigurationSource};
///
/// struct Defaults;
///
/// impl ConfigurationSource for Defaults {
///     fn name(&self) -> &str {
///         "defaults"
///     }
///
///     fn contribute(&self) -> ConfigResult<ConfigurationMap> {
///         Ok(ConfigurationMap::from([("pool.size".to_string(), "8".to_string())]))
///     }
/// }
/// ```
pub trait ConfigurationSource: Send + Sync {
    /// Human-readable name used in logs and metrics.
    fn name(&self) -> &str;

    /// Produces this source's current contribution.
    ///
    /// Called on every merge; implementations should return live values.
    fn contribute(&self) -> ConfigResult<ConfigurationMap>;
}

/// A source that can persist changes to its backing storage.
pub trait MutableSource: ConfigurationSource {
    /// Adds or replaces `key` in persistent storage.
    ///
    /// Returns [`PutOutcome::Updated`] if the key was already stored,
    /// [`PutOutcome::Created`] otherwise.
    fn save(&self, key: &str, value: &str) -> ConfigResult<PutOutcome>;

    /// Removes `key` from persistent storage.
    fn delete(&self, key: &str) -> ConfigResult<DeleteOutcome>;
}

/// Outcome of a `put` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PutOutcome {
    /// The key did not exist before.
    Created,
    /// An existing value was replaced.
    Updated,
    /// Admin mode is disabled; nothing changed.
    Rejected,
}

impl PutOutcome {
    /// Combines the outcomes of two sources; any update wins over create.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Rejected, o) | (o, Self::Rejected) => o,
            (Self::Updated, _) | (_, Self::Updated) => Self::Updated,
            _ => Self::Created,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a `delete` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The key was removed.
    Deleted,
    /// The key was not present.
    NotFound,
    /// Admin mode is disabled; nothing changed.
    Rejected,
}

impl DeleteOutcome {
    /// Combines the outcomes of two sources; any deletion wins.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Rejected, o) | (o, Self::Rejected) => o,
            (Self::Deleted, _) | (_, Self::Deleted) => Self::Deleted,
            _ => Self::NotFound,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-memory source, useful for defaults and for tests.
///
/// Values can be changed at runtime with [`StaticSource::insert`]; the next
/// merge picks them up.
#[derive(Debug)]
pub struct StaticSource {
    name: String,
    values: RwLock<ConfigurationMap>,
}

impl StaticSource {
    /// Creates a source with the given name and values.
    pub fn new(name: impl Into<String>, values: ConfigurationMap) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(values),
        }
    }

    /// Creates a source from key/value pairs.
    pub fn from_pairs<K, V>(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            name,
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        )
    }

    /// Sets a value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl ConfigurationSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(&self) -> ConfigResult<ConfigurationMap> {
        Ok(self.values.read().clone())
    }
}
