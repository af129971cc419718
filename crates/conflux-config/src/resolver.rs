//! Location of the external properties file.
//!
//! The configuration directory is resolved in order from:
//!
//! 1. the directory already memoized in the [`ConfigContext`]
//! 2. the system property `<app>.config.dir` (or its `<APP>_CONFIG_DIR` alias)
//! 3. the naming registry key `java:global/jbeans/<app>/ENVIRONMENT_PROPERTIES_PATH`
//!
//! The first successful resolution is memoized for the life of the context.

use std::fmt;
use std::path::PathBuf;

use conflux_core::{ConfigContext, ConfigResult, ConfigurationError};
use tracing::{debug, info};

/// Where the configuration directory was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOrigin {
    /// Already memoized by an earlier resolution.
    Memoized,
    /// From the `<app>.config.dir` system property.
    SystemProperty,
    /// From the naming registry.
    Naming,
}

impl fmt::Display for LocationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memoized => "memoized",
            Self::SystemProperty => "system_property",
            Self::Naming => "naming",
        })
    }
}

/// A resolved properties file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Configuration directory.
    pub directory: PathBuf,
    /// Full path of the properties file.
    pub file: PathBuf,
    /// How the directory was found.
    pub origin: LocationOrigin,
}

/// Resolves the properties file for the context's application.
///
/// `file_name` overrides the identity's properties file name.
///
/// # Errors
///
/// Returns [`ConfigurationError::MissingApplicationIdentity`] if no identity
/// is established, or [`ConfigurationError::MissingConfigDirectory`] if
/// neither lookup names a directory.
pub fn resolve_location(
    context: &ConfigContext,
    file_name: Option<&str>,
) -> ConfigResult<ResolvedLocation> {
    let identity = context.require_identity()?;
    let file_name = file_name.unwrap_or(&identity.properties_file);

    if let Some(dir) = context.config_dir() {
        debug!(directory = %dir.display(), "using memoized configuration directory");
        return Ok(ResolvedLocation {
            directory: dir.to_path_buf(),
            file: dir.join(file_name),
            origin: LocationOrigin::Memoized,
        });
    }

    let property = identity.config_dir_property();
    let naming_key = identity.naming_key();

    let (raw, origin) = if let Some(dir) = non_blank(context.system_properties().get(&property)) {
        (dir.to_string(), LocationOrigin::SystemProperty)
    } else if let Some(dir) = context.naming().lookup(&naming_key).filter(|v| !v.trim().is_empty())
    {
        (dir, LocationOrigin::Naming)
    } else {
        return Err(ConfigurationError::missing_config_directory(property, naming_key));
    };

    let directory = context.memoize_config_dir(PathBuf::from(raw.trim())).to_path_buf();
    info!(
        application = %identity.name,
        directory = %directory.display(),
        origin = %origin,
        "configuration directory resolved"
    );

    Ok(ResolvedLocation {
        file: directory.join(file_name),
        directory,
        origin,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
