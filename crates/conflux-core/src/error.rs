//! Error types for Conflux.
//!
//! This module provides [`ConfigurationError`], the single error type shared by
//! every configuration source and by the aggregator.
//!
//! # Propagation
//!
//! | Phase | Errors | Effect |
//! |---|---|---|
//! | Bootstrap | `BootstrapUnreadable`, `MissingApplicationIdentity` | Aggregate left empty (or bootstrap-only) |
//! | Source load | `MissingConfigDirectory`, `ConfigurationFileNotFound`, `MissingDecryptionKey`, `DecryptionFailed` | Source contributes nothing |
//! | Typed read | `MalformedTypedValue` | Returned to caller |
//! | Mutation | `PersistenceFailed`, `NoMutableSource` | Returned to caller, in-memory map untouched |
//!
//! Read misses are never errors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::APP_NAME_KEY;

/// Result type alias using [`ConfigurationError`].
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Stable classification of a [`ConfigurationError`].
///
/// Presentation layers map this to a transport status without matching on
/// variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bootstrap properties could not be read.
    BootstrapUnreadable,
    /// No application name in the bootstrap properties.
    MissingApplicationIdentity,
    /// No configuration directory could be resolved.
    MissingConfigDirectory,
    /// The resolved configuration file is missing or unreadable.
    ConfigurationFileNotFound,
    /// Encrypted values are present but no key is configured.
    MissingDecryptionKey,
    /// An encrypted value could not be decrypted.
    DecryptionFailed,
    /// A present value could not be parsed as the requested type.
    MalformedTypedValue,
    /// Writing the configuration file failed.
    PersistenceFailed,
    /// A mutation was requested but no source accepts writes.
    NoMutableSource,
    /// The naming registry could not be loaded.
    InvalidNamingRegistry,
}

impl ErrorKind {
    /// Returns `true` if this kind makes a source unusable until restart or
    /// until the underlying environment is fixed.
    #[must_use]
    pub const fn is_fatal_for_source(&self) -> bool {
        matches!(
            self,
            Self::BootstrapUnreadable
                | Self::MissingApplicationIdentity
                | Self::MissingConfigDirectory
                | Self::ConfigurationFileNotFound
                | Self::MissingDecryptionKey
                | Self::DecryptionFailed
                | Self::InvalidNamingRegistry
        )
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BootstrapUnreadable => "BOOTSTRAP_UNREADABLE",
            Self::MissingApplicationIdentity => "MISSING_APPLICATION_IDENTITY",
            Self::MissingConfigDirectory => "MISSING_CONFIG_DIRECTORY",
            Self::ConfigurationFileNotFound => "CONFIGURATION_FILE_NOT_FOUND",
            Self::MissingDecryptionKey => "MISSING_DECRYPTION_KEY",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::MalformedTypedValue => "MALFORMED_TYPED_VALUE",
            Self::PersistenceFailed => "PERSISTENCE_FAILED",
            Self::NoMutableSource => "NO_MUTABLE_SOURCE",
            Self::InvalidNamingRegistry => "INVALID_NAMING_REGISTRY",
        }
    }
}

/// Errors raised while loading, reading or mutating configuration.
///
/// # Example
///
/// ```
/// use conflux_core::{ConfigurationError, ErrorKind};
///
/// let err = ConfigurationError::malformed("server.port", "eighty", "integer");
/// assert_eq!(err.kind(), ErrorKind::MalformedTypedValue);
/// assert!(err.to_string().contains("server.port"));
/// ```
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The bootstrap properties could not be read.
    #[error("bootstrap properties unreadable: {origin}")]
    BootstrapUnreadable {
        /// Where the bootstrap was expected.
        origin: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No application name could be resolved from the bootstrap.
    #[error("application name is not configured; set `{key}` in the bootstrap properties", key = APP_NAME_KEY)]
    MissingApplicationIdentity,

    /// Neither the system property nor the naming registry names a directory.
    #[error(
        "no -D{property} system property OR naming entry {naming_key} was found; please check your configuration"
    )]
    MissingConfigDirectory {
        /// The system property that was consulted.
        property: String,
        /// The naming registry key that was consulted.
        naming_key: String,
    },

    /// The resolved configuration file does not exist or cannot be read.
    #[error("configuration file not found: {path}")]
    ConfigurationFileNotFound {
        /// Resolved path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file holds `ENC(...)` values but no decryption key is configured.
    #[error("{path} has encrypted properties, but the `{property}` property is missing")]
    MissingDecryptionKey {
        /// File holding the encrypted values.
        path: PathBuf,
        /// Property expected to hold the key.
        property: String,
    },

    /// An `ENC(...)` value could not be decrypted with the configured key.
    #[error("failed to decrypt value of `{key}`: {reason}")]
    DecryptionFailed {
        /// The property whose value failed.
        key: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// A present value could not be parsed as the requested type.
    #[error("value of `{key}` is not a valid {expected}: {value:?}")]
    MalformedTypedValue {
        /// The property key.
        key: String,
        /// The raw value.
        value: String,
        /// Name of the requested type.
        expected: &'static str,
    },

    /// Reading or rewriting the configuration file failed.
    #[error("failed to persist configuration file {path}")]
    PersistenceFailed {
        /// The file being rewritten.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A mutation was requested but no registered source accepts writes.
    #[error("no mutation-capable configuration source is registered")]
    NoMutableSource,

    /// The naming registry could not be loaded.
    #[error("invalid naming registry {origin}: {reason}")]
    InvalidNamingRegistry {
        /// Where the registry was loaded from.
        origin: String,
        /// Explanation of the failure.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a bootstrap read error.
    pub fn bootstrap_unreadable(origin: impl Into<String>, source: std::io::Error) -> Self {
        Self::BootstrapUnreadable {
            origin: origin.into(),
            source,
        }
    }

    /// Creates a missing directory error.
    pub fn missing_config_directory(
        property: impl Into<String>,
        naming_key: impl Into<String>,
    ) -> Self {
        Self::MissingConfigDirectory {
            property: property.into(),
            naming_key: naming_key.into(),
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigurationFileNotFound {
            path: path.into(),
            source,
        }
    }

    /// Creates a missing decryption key error.
    pub fn missing_decryption_key(path: impl Into<PathBuf>, property: impl Into<String>) -> Self {
        Self::MissingDecryptionKey {
            path: path.into(),
            property: property.into(),
        }
    }

    /// Creates a decryption failure error.
    pub fn decryption_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed typed value error.
    pub fn malformed(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::MalformedTypedValue {
            key: key.into(),
            value: value.into(),
            expected,
        }
    }

    /// Creates a persistence error.
    pub fn persistence_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceFailed {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid naming registry error.
    pub fn invalid_naming_registry(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNamingRegistry {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BootstrapUnreadable { .. } => ErrorKind::BootstrapUnreadable,
            Self::MissingApplicationIdentity => ErrorKind::MissingApplicationIdentity,
            Self::MissingConfigDirectory { .. } => ErrorKind::MissingConfigDirectory,
            Self::ConfigurationFileNotFound { .. } => ErrorKind::ConfigurationFileNotFound,
            Self::MissingDecryptionKey { .. } => ErrorKind::MissingDecryptionKey,
            Self::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            Self::MalformedTypedValue { .. } => ErrorKind::MalformedTypedValue,
            Self::PersistenceFailed { .. } => ErrorKind::PersistenceFailed,
            Self::NoMutableSource => ErrorKind::NoMutableSource,
            Self::InvalidNamingRegistry { .. } => ErrorKind::InvalidNamingRegistry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_missing_identity_names_bootstrap_key() {
        let err = ConfigurationError::MissingApplicationIdentity;
        assert!(err.to_string().contains(APP_NAME_KEY));
        assert_eq!(err.kind(), ErrorKind::MissingApplicationIdentity);
    }

    #[test]
    fn test_missing_directory_names_both_lookups() {
        let err = ConfigurationError::missing_config_directory(
            "demo.config.dir",
            "java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH",
        );
        let message = err.to_string();
        assert!(message.contains("-Ddemo.config.dir"));
        assert!(message.contains("java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH"));
    }

    #[test]
    fn test_persistence_failed_keeps_io_cause() {
        let cause = io::Error::new(io::ErrorKind::PermissionDenied, "read-only fs");
        let err = ConfigurationError::persistence_failed("/etc/demo/demo.properties", cause);

        assert_eq!(err.kind(), ErrorKind::PersistenceFailed);
        let source = err.source().expect("io cause");
        assert!(source.to_string().contains("read-only fs"));
    }

    #[test]
    fn test_malformed_value_message() {
        let err = ConfigurationError::malformed("pool.size", "ten", "integer");
        let message = err.to_string();
        assert!(message.contains("pool.size"));
        assert!(message.contains("\"ten\""));
        assert!(message.contains("integer"));
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::MissingDecryptionKey.is_fatal_for_source());
        assert!(ErrorKind::ConfigurationFileNotFound.is_fatal_for_source());
        assert!(!ErrorKind::MalformedTypedValue.is_fatal_for_source());
        assert!(!ErrorKind::PersistenceFailed.is_fatal_for_source());
        assert!(!ErrorKind::NoMutableSource.is_fatal_for_source());
    }

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            ErrorKind::BootstrapUnreadable,
            ErrorKind::MissingApplicationIdentity,
            ErrorKind::MissingConfigDirectory,
            ErrorKind::ConfigurationFileNotFound,
            ErrorKind::MissingDecryptionKey,
            ErrorKind::DecryptionFailed,
            ErrorKind::MalformedTypedValue,
            ErrorKind::PersistenceFailed,
            ErrorKind::NoMutableSource,
            ErrorKind::InvalidNamingRegistry,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(ErrorKind::code).collect();
        assert_eq!(codes.len(), kinds.len());
    }
}
