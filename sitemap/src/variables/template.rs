//! Parameters declared on a node.

use super::{MapStack, VariableResolver};
use crate::components::ComponentRegistry;
use crate::config::Configuration;
use crate::core::Parameters;
use crate::environment::Environment;
use crate::errors::{ConfigurationError, SitemapResult};

/// The `parameter` children of a node, compiled.
#[derive(Debug, Clone, Default)]
pub struct ParameterTemplate {
    entries: Vec<(String, VariableResolver)>,
}

impl ParameterTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles the `parameter(name, value)` children of `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a missing attribute or a
    /// malformed value.
    pub fn from_config(
        config: &Configuration,
        registry: &ComponentRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut entries = Vec::new();
        for parameter in config.children_named("parameter") {
            let name = parameter.required_attribute("name")?;
            let value = parameter.required_attribute("value")?;
            let resolver = VariableResolver::parse(value, registry)
                .map_err(|e| e.at(&parameter.location))?;
            entries.push((name.to_string(), resolver));
        }
        Ok(Self { entries })
    }

    /// Adds an entry.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: VariableResolver) -> Self {
        self.entries.push((name.into(), value));
        self
    }

    /// Returns true if no parameter is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluates every value.
    ///
    /// # Errors
    ///
    /// Propagates expression evaluation failures.
    pub fn resolve(&self, maps: &MapStack, env: &Environment) -> SitemapResult<Parameters> {
        let mut parameters = Parameters::new();
        for (name, value) in &self.entries {
            parameters.set(name.clone(), value.resolve(maps, env)?);
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_resolves_in_order() {
        let registry = ComponentRegistry::with_builtins();
        let config = Configuration::new("generate")
            .with_child(
                Configuration::new("parameter")
                    .with_attribute("name", "page")
                    .with_attribute("value", "{1}"),
            )
            .with_child(
                Configuration::new("parameter")
                    .with_attribute("name", "mode")
                    .with_attribute("value", "full"),
            );
        let template = ParameterTemplate::from_config(&config, &registry).unwrap();

        let mut maps = MapStack::new();
        maps.push(None, std::iter::once(("1".to_string(), "home".to_string())).collect());
        let params = template.resolve(&maps, &Environment::new("home")).unwrap();
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("page", "home"), ("mode", "full")]);
    }

    #[test]
    fn test_parameter_without_value_is_rejected() {
        let registry = ComponentRegistry::with_builtins();
        let config = Configuration::new("read")
            .with_child(Configuration::new("parameter").with_attribute("name", "x"));
        assert!(ParameterTemplate::from_config(&config, &registry).is_err());
    }
}
