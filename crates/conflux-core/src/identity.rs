//! Application identity and decryption key.
//!
//! The [`ApplicationIdentity`] is discovered from the bootstrap properties and
//! decides where the external properties file lives, whether runtime mutation
//! is allowed, and which system property carries the decryption key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};
use crate::source::ConfigurationMap;

/// Bootstrap key holding the application name.
pub const APP_NAME_KEY: &str = "app.name";

/// Bootstrap key holding the admin-mode flag.
pub const ADMIN_ENABLED_KEY: &str = "app.props.admin.enabled";

/// Bootstrap key holding the external properties file name.
pub const PROPERTIES_FILE_KEY: &str = "app.props.file";

/// Bootstrap key holding the name of the decryption key property.
pub const DECRYPTION_KEY_NAME_KEY: &str = "app.props.encKey.name";

/// Decryption key property consulted when the bootstrap names none.
pub const DEFAULT_DECRYPTION_KEY_PROPERTY: &str = "eKey";

const NAMING_ROOT: &str = "java:global/jbeans/";
const NAMING_SUFFIX: &str = "/ENVIRONMENT_PROPERTIES_PATH";

/// Process-wide identity of the configured application.
///
/// # Example
///
/// ```
/// use conflux_core::ApplicationIdentity;
///
/// let identity = ApplicationIdentity::new("demo").with_admin_enabled(true);
/// assert_eq!(identity.properties_file, "demo.properties");
/// assert_eq!(identity.config_dir_property(), "demo.config.dir");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationIdentity {
    /// Application name, never empty.
    pub name: String,
    /// Whether runtime mutation is permitted.
    pub admin_enabled: bool,
    /// File name of the external properties file.
    pub properties_file: String,
    /// System property holding the decryption key.
    pub decryption_key_property: String,
}

impl ApplicationIdentity {
    /// Creates an identity with default file name and key property.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            properties_file: format!("{name}.properties"),
            name,
            admin_enabled: false,
            decryption_key_property: DEFAULT_DECRYPTION_KEY_PROPERTY.to_string(),
        }
    }

    /// Extracts the identity from bootstrap properties.
    ///
    /// The admin flag is enabled only for a case-insensitive `"true"`; any
    /// other value, or its absence, leaves it disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingApplicationIdentity`] if the
    /// application name is absent or blank.
    pub fn from_bootstrap(bootstrap: &ConfigurationMap) -> ConfigResult<Self> {
        let name = bootstrap
            .get(APP_NAME_KEY)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigurationError::MissingApplicationIdentity)?;

        let mut identity = Self::new(name);

        if let Some(flag) = bootstrap.get(ADMIN_ENABLED_KEY) {
            identity.admin_enabled = flag.trim().eq_ignore_ascii_case("true");
        }

        if let Some(file) = bootstrap
            .get(PROPERTIES_FILE_KEY)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
        {
            identity.properties_file = file.to_string();
        }

        if let Some(property) = bootstrap
            .get(DECRYPTION_KEY_NAME_KEY)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
        {
            identity.decryption_key_property = property.to_string();
        }

        Ok(identity)
    }

    /// Sets the admin-mode flag.
    #[must_use]
    pub fn with_admin_enabled(mut self, enabled: bool) -> Self {
        self.admin_enabled = enabled;
        self
    }

    /// Sets the external properties file name.
    #[must_use]
    pub fn with_properties_file(mut self, file: impl Into<String>) -> Self {
        self.properties_file = file.into();
        self
    }

    /// Sets the system property holding the decryption key.
    #[must_use]
    pub fn with_decryption_key_property(mut self, property: impl Into<String>) -> Self {
        self.decryption_key_property = property.into();
        self
    }

    /// Name of the system property giving the configuration directory.
    #[must_use]
    pub fn config_dir_property(&self) -> String {
        format!("{}.config.dir", self.name)
    }

    /// Naming registry key giving the configuration directory.
    #[must_use]
    pub fn naming_key(&self) -> String {
        format!("{NAMING_ROOT}{}{NAMING_SUFFIX}", self.name)
    }
}

/// The process-wide decryption key.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum DecryptionKey {
    /// No key configured.
    #[default]
    Undefined,
    /// A configured key.
    Defined(String),
}

impl DecryptionKey {
    /// Textual sentinel for an undefined key.
    pub const UNDEFINED_SENTINEL: &'static str = "UNDEFINED";

    /// Builds a key from a raw property value.
    ///
    /// Absent, empty, or sentinel values are [`DecryptionKey::Undefined`].
    #[must_use]
    pub fn from_property(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() && v != Self::UNDEFINED_SENTINEL => {
                Self::Defined(v.to_string())
            }
            _ => Self::Undefined,
        }
    }

    /// Returns `true` if a key is configured.
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    /// Returns the secret, if configured.
    #[must_use]
    pub fn expose_secret(&self) -> Option<&str> {
        match self {
            Self::Defined(secret) => Some(secret),
            Self::Undefined => None,
        }
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "DecryptionKey({})", Self::UNDEFINED_SENTINEL),
            Self::Defined(_) => write!(f, "DecryptionKey(***)"),
        }
    }
}
