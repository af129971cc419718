//! Static naming registry.
//!
//! Bindings can be declared in code or loaded from a TOML file of quoted
//! names mapped to string values:
//!
//! ```toml
//! "java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH" = "/etc/demo"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use conflux_core::{ConfigResult, ConfigurationError, NamingContext};

/// A naming registry backed by a fixed set of bindings.
///
/// # Example
///
/// ```
/// use conflux_config::StaticNamingContext;
/// use conflux_core::NamingContext;
///
/// let naming = StaticNamingContext::new().bind("jdbc/primary", "postgres://db");
/// assert_eq!(naming.lookup("jdbc/primary").as_deref(), Some("postgres://db"));
/// assert!(naming.lookup("jdbc/replica").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticNamingContext {
    bindings: HashMap<String, String>,
}

impl StaticNamingContext {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Parses bindings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidNamingRegistry`] if the text is not
    /// a flat table of strings.
    pub fn from_toml_str(origin: &str, content: &str) -> ConfigResult<Self> {
        let bindings: HashMap<String, String> = toml::from_str(content)
            .map_err(|e| ConfigurationError::invalid_naming_registry(origin, e.to_string()))?;
        Ok(Self { bindings })
    }

    /// Loads bindings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidNamingRegistry`] if the file
    /// cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigurationError::invalid_naming_registry(&origin, e.to_string()))?;
        Self::from_toml_str(&origin, &content)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl NamingContext for StaticNamingContext {
    fn lookup(&self, name: &str) -> Option<String> {
        self.bindings.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_toml_str() {
        let naming = StaticNamingContext::from_toml_str(
            "inline",
            r#""java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH" = "/etc/demo""#,
        )
        .unwrap();
        assert_eq!(naming.len(), 1);
        assert_eq!(
            naming
                .lookup("java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH")
                .as_deref(),
            Some("/etc/demo")
        );
    }

    #[test]
    fn test_non_string_values_rejected() {
        let err = StaticNamingContext::from_toml_str("inline", "port = 8080").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNamingRegistry);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#""a/b" = "c""#).unwrap();

        let naming = StaticNamingContext::from_toml_file(file.path()).unwrap();
        assert_eq!(naming.lookup("a/b").as_deref(), Some("c"));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = StaticNamingContext::from_toml_file("/nonexistent/naming.toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNamingRegistry);
    }
}
