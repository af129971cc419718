//! Shared configuration context.
//!
//! The [`ConfigContext`] holds the process-wide state established while the
//! aggregator initializes: the application identity, the decryption key and
//! the memoized configuration directory. Each slot is written at most once;
//! later writers observe the first value.
//!
//! It also carries the two lookup facilities used to locate the external
//! properties file: [`SystemProperties`] and a [`NamingContext`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use crate::error::{ConfigResult, ConfigurationError};
use crate::identity::{ApplicationIdentity, DecryptionKey};

static UNDEFINED_KEY: DecryptionKey = DecryptionKey::Undefined;

/// A naming registry that maps well-known names to values.
pub trait NamingContext: Send + Sync + fmt::Debug {
    /// Looks up `name`, returning `None` if it is not bound.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// A naming registry with no bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyNamingContext;

impl NamingContext for EmptyNamingContext {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Process-level properties, the equivalent of `-Dname=value` flags.
///
/// Seeded from the environment with [`SystemProperties::from_env`] and
/// extended with explicit overrides. Lookups try the exact name first, then
/// its environment alias (`demo.config.dir` → `DEMO_CONFIG_DIR`).
///
/// # Example
///
/// ```
/// use conflux_core::SystemProperties;
///
/// let props = SystemProperties::new().with("DEMO_CONFIG_DIR", "/etc/demo");
/// assert_eq!(props.get("demo.config.dir"), Some("/etc/demo"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemProperties {
    properties: HashMap<String, String>,
}

impl SystemProperties {
    /// Creates an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a property set from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            properties: std::env::vars().collect(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Looks up a property by exact name, then by environment alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .or_else(|| self.properties.get(&env_alias(name)))
            .map(String::as_str)
    }
}

/// Environment-variable spelling of a property name.
#[must_use]
pub fn env_alias(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Once-initialized state shared by the aggregator and its sources.
pub struct ConfigContext {
    system: SystemProperties,
    naming: Arc<dyn NamingContext>,
    identity: OnceLock<ApplicationIdentity>,
    decryption_key: OnceLock<DecryptionKey>,
    config_dir: OnceLock<PathBuf>,
}

impl ConfigContext {
    /// Creates a context with the given lookup facilities.
    pub fn new(system: SystemProperties, naming: Arc<dyn NamingContext>) -> Self {
        Self {
            system,
            naming,
            identity: OnceLock::new(),
            decryption_key: OnceLock::new(),
            config_dir: OnceLock::new(),
        }
    }

    /// Records the application identity and resolves the decryption key.
    ///
    /// Only the first call has an effect; the established identity is
    /// returned either way.
    pub fn establish_identity(&self, identity: ApplicationIdentity) -> &ApplicationIdentity {
        let mut fresh = false;
        let established = self.identity.get_or_init(|| {
            fresh = true;
            identity
        });

        if fresh {
            let raw = self.system.get(&established.decryption_key_property);
            let key = self
                .decryption_key
                .get_or_init(|| DecryptionKey::from_property(raw));
            info!(
                application = %established.name,
                admin_enabled = established.admin_enabled,
                properties_file = %established.properties_file,
                decryption_key_defined = key.is_defined(),
                "application identity established"
            );
        } else {
            debug!(application = %established.name, "application identity already established");
        }

        established
    }

    /// Returns the established identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ApplicationIdentity> {
        self.identity.get()
    }

    /// Returns the established identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingApplicationIdentity`] if no
    /// identity has been established yet.
    pub fn require_identity(&self) -> ConfigResult<&ApplicationIdentity> {
        self.identity
            .get()
            .filter(|identity| !identity.name.is_empty())
            .ok_or(ConfigurationError::MissingApplicationIdentity)
    }

    /// Returns the decryption key; undefined until an identity is established.
    #[must_use]
    pub fn decryption_key(&self) -> &DecryptionKey {
        self.decryption_key.get().unwrap_or(&UNDEFINED_KEY)
    }

    /// Returns the memoized configuration directory.
    #[must_use]
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.get().map(PathBuf::as_path)
    }

    /// Memoizes the configuration directory, returning the established value.
    pub fn memoize_config_dir(&self, dir: PathBuf) -> &Path {
        let established = self.config_dir.get_or_init(|| dir.clone());
        if established != &dir {
            warn!(
                established = %established.display(),
                ignored = %dir.display(),
                "configuration directory already memoized"
            );
        }
        established
    }

    /// Returns the system properties.
    #[must_use]
    pub fn system_properties(&self) -> &SystemProperties {
        &self.system
    }

    /// Returns the naming registry.
    #[must_use]
    pub fn naming(&self) -> &dyn NamingContext {
        self.naming.as_ref()
    }

    /// Clears the identity, key and directory so a test can start over.
    pub fn reset(&mut self) {
        self.identity = OnceLock::new();
        self.decryption_key = OnceLock::new();
        self.config_dir = OnceLock::new();
    }
}

impl Default for ConfigContext {
    fn default() -> Self {
        Self::new(SystemProperties::from_env(), Arc::new(EmptyNamingContext))
    }
}

impl fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigContext")
            .field("identity", &self.identity.get())
            .field("decryption_key", self.decryption_key())
            .field("config_dir", &self.config_dir.get())
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}
