//! Builder for [`ConfigurationAggregator`].

use std::path::Path;
use std::sync::Arc;

use conflux_core::{
    ApplicationIdentity, ConfigContext, ConfigResult, ConfigurationSource, EmptyNamingContext,
    MutableSource, NamingContext, SystemProperties,
};

use crate::aggregator::ConfigurationAggregator;
use crate::bootstrap::BootstrapSource;
use crate::naming::StaticNamingContext;
use crate::provider::FileBackedProvider;

enum Registration {
    Source(Arc<dyn ConfigurationSource>),
    Mutable {
        source: Arc<dyn ConfigurationSource>,
        mutable: Arc<dyn MutableSource>,
    },
    File(Option<String>),
}

/// Assembles a [`ConfigurationAggregator`].
///
/// Sources are merged in the order they are registered. File providers are
/// created against the aggregator's shared context when [`build`] runs.
///
/// # Example
///
/// ```no_run
/// use conflux_config::AggregatorBuilder;
///
/// # fn main() -> Result<(), conflux_core::ConfigurationError> {
/// let aggregator = AggregatorBuilder::new()
///     .with_bootstrap_file("conflux-app.properties")
///     .with_naming_file("naming.toml")?
///     .with_file_provider()
///     .build();
///
/// let greeting = aggregator.get_or("greeting", "hello");
/// # Ok(())
/// # }
/// ```
///
/// [`build`]: AggregatorBuilder::build
pub struct AggregatorBuilder {
    context: Option<Arc<ConfigContext>>,
    system: Option<SystemProperties>,
    naming: Option<Arc<dyn NamingContext>>,
    identity: Option<ApplicationIdentity>,
    bootstrap: Option<BootstrapSource>,
    registrations: Vec<Registration>,
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: None,
            system: None,
            naming: None,
            identity: None,
            bootstrap: None,
            registrations: Vec::new(),
        }
    }

    /// Shares an existing context. System properties and naming set on this
    /// builder are then ignored.
    #[must_use]
    pub fn with_context(mut self, context: Arc<ConfigContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Uses these system properties instead of the process environment.
    #[must_use]
    pub fn with_system_properties(mut self, system: SystemProperties) -> Self {
        self.system = Some(system);
        self
    }

    /// Uses this naming registry.
    #[must_use]
    pub fn with_naming(mut self, naming: impl NamingContext + 'static) -> Self {
        self.naming = Some(Arc::new(naming));
        self
    }

    /// Loads the naming registry from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNamingRegistry` if the file cannot be read or parsed.
    pub fn with_naming_file(self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        Ok(self.with_naming(StaticNamingContext::from_toml_file(path)?))
    }

    /// Establishes the identity directly. The bootstrap, if any, cannot
    /// replace it.
    #[must_use]
    pub fn with_identity(mut self, identity: ApplicationIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Reads the bootstrap from a file.
    #[must_use]
    pub fn with_bootstrap_file(mut self, path: impl AsRef<Path>) -> Self {
        self.bootstrap = Some(BootstrapSource::from_path(path));
        self
    }

    /// Uses bootstrap text bundled with the application.
    #[must_use]
    pub fn with_bootstrap_str(
        mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.bootstrap = Some(BootstrapSource::embedded(name, content));
        self
    }

    /// Registers a read-only source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.registrations.push(Registration::Source(source));
        self
    }

    /// Registers a source that also receives mutations.
    #[must_use]
    pub fn with_mutable_source<S>(mut self, source: Arc<S>) -> Self
    where
        S: MutableSource + 'static,
    {
        self.registrations.push(Registration::Mutable {
            source: source.clone(),
            mutable: source,
        });
        self
    }

    /// Registers a [`FileBackedProvider`] for the identity's properties file.
    #[must_use]
    pub fn with_file_provider(mut self) -> Self {
        self.registrations.push(Registration::File(None));
        self
    }

    /// Registers a [`FileBackedProvider`] for another file in the
    /// configuration directory.
    #[must_use]
    pub fn with_named_file_provider(mut self, file_name: impl Into<String>) -> Self {
        self.registrations
            .push(Registration::File(Some(file_name.into())));
        self
    }

    /// Builds the aggregator. Nothing is loaded until first access.
    #[must_use]
    pub fn build(self) -> ConfigurationAggregator {
        let context = self.context.unwrap_or_else(|| {
            Arc::new(ConfigContext::new(
                self.system.unwrap_or_else(SystemProperties::from_env),
                self.naming.unwrap_or_else(|| Arc::new(EmptyNamingContext)),
            ))
        });

        if let Some(identity) = self.identity {
            context.establish_identity(identity);
        }

        let mut sources: Vec<Arc<dyn ConfigurationSource>> = Vec::new();
        let mut mutable_sources: Vec<Arc<dyn MutableSource>> = Vec::new();

        for registration in self.registrations {
            match registration {
                Registration::Source(source) => sources.push(source),
                Registration::Mutable { source, mutable } => {
                    sources.push(source);
                    mutable_sources.push(mutable);
                }
                Registration::File(file_name) => {
                    let mut provider = FileBackedProvider::new(Arc::clone(&context));
                    if let Some(file_name) = file_name {
                        provider = provider.with_file_name(file_name);
                    }
                    let provider = Arc::new(provider);
                    sources.push(provider.clone());
                    mutable_sources.push(provider);
                }
            }
        }

        ConfigurationAggregator::from_parts(context, self.bootstrap, sources, mutable_sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::StaticSource;

    #[test]
    fn test_shared_context() {
        let context = Arc::new(ConfigContext::new(
            SystemProperties::new(),
            Arc::new(EmptyNamingContext),
        ));
        let aggregator = AggregatorBuilder::new()
            .with_context(Arc::clone(&context))
            .with_bootstrap_str("app", "app.name=shared\n")
            .build();

        aggregator.initialize().unwrap();
        assert_eq!(context.identity().unwrap().name, "shared");
        assert!(Arc::ptr_eq(aggregator.context(), &context));
    }

    #[test]
    fn test_identity_wins_over_bootstrap() {
        let aggregator = AggregatorBuilder::new()
            .with_system_properties(SystemProperties::new())
            .with_identity(ApplicationIdentity::new("explicit"))
            .with_bootstrap_str("app", "app.name=bootstrap\n")
            .build();

        assert_eq!(aggregator.identity().unwrap().name, "explicit");
        assert_eq!(aggregator.get("app.name").as_deref(), Some("bootstrap"));
    }

    #[test]
    fn test_registration_order() {
        let aggregator = AggregatorBuilder::new()
            .with_system_properties(SystemProperties::new())
            .with_bootstrap_str("app", "app.name=demo\nk=bootstrap\n")
            .with_source(Arc::new(StaticSource::from_pairs("first", [("k", "first")])))
            .with_source(Arc::new(StaticSource::from_pairs("second", [("k", "second")])))
            .build();

        assert!(aggregator.has_sources());
        assert_eq!(aggregator.get("k").as_deref(), Some("second"));
    }

    #[test]
    fn test_naming_file_error() {
        let err = AggregatorBuilder::new()
            .with_naming_file("/nonexistent/naming.toml")
            .err()
            .unwrap();
        assert_eq!(err.kind(), conflux_core::ErrorKind::InvalidNamingRegistry);
    }
}
