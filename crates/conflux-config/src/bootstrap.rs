//! Bootstrap properties.
//!
//! The bootstrap is a small properties document bundled with the application
//! that names it (`app.name`) and sets the admin flag, the external file name
//! and the decryption key property. Its entries are also part of the aggregate.

use std::fs;
use std::path::{Path, PathBuf};

use conflux_core::{ConfigResult, ConfigurationError, ConfigurationMap, ConfigurationSource};
use tracing::debug;

use crate::properties;

/// Conventional file name of the bootstrap properties.
pub const DEFAULT_BOOTSTRAP_FILE: &str = "conflux-app.properties";

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Embedded { name: String, content: String },
}

/// Source of the bootstrap properties.
///
/// # Example
///
/// ```
/// use conflux_config::BootstrapSource;
///
/// let bootstrap = BootstrapSource::embedded("demo", "app.name=demo\n");
/// assert_eq!(bootstrap.load().unwrap()["app.name"], "demo");
/// ```
#[derive(Debug, Clone)]
pub struct BootstrapSource {
    origin: Origin,
}

impl BootstrapSource {
    /// Reads the bootstrap from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            origin: Origin::File(path.as_ref().to_path_buf()),
        }
    }

    /// Uses bootstrap text bundled with the application.
    pub fn embedded(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: Origin::Embedded {
                name: name.into(),
                content: content.into(),
            },
        }
    }

    /// Describes where the bootstrap comes from.
    #[must_use]
    pub fn origin(&self) -> String {
        match &self.origin {
            Origin::File(path) => path.display().to_string(),
            Origin::Embedded { name, .. } => format!("embedded:{name}"),
        }
    }

    /// Reads and parses the bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::BootstrapUnreadable`] if the file cannot
    /// be read.
    pub fn load(&self) -> ConfigResult<ConfigurationMap> {
        let entries = match &self.origin {
            Origin::File(path) => {
                let content = fs::read_to_string(path)
                    .map_err(|e| ConfigurationError::bootstrap_unreadable(self.origin(), e))?;
                properties::parse(&content)
            }
            Origin::Embedded { content, .. } => properties::parse(content),
        };

        debug!(origin = %self.origin(), entries = entries.len(), "bootstrap properties loaded");
        Ok(entries)
    }
}

impl ConfigurationSource for BootstrapSource {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn contribute(&self) -> ConfigResult<ConfigurationMap> {
        self.load()
    }
}
