//! Component registry keyed by `role[/type]`.

use super::{
    Action, ActionFactory, ActionPool, Generator, InputModule, Interpreter, Matcher,
    NoSourceResolver, NotifyingGenerator, Reader, RegexpUriMatcher, RequestHeaderModule,
    RequestParamModule, RequestParameterSelector, ParameterSelector, Selector, Serializer,
    SourceResolver, Transformer, WildcardUriMatcher, XmlSerializer,
};
use crate::errors::{codes, ConfigurationError, ErrorInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The role a component plays in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Request matchers.
    Matcher,
    /// Branch selectors.
    Selector,
    /// Actions.
    Action,
    /// Readers.
    Reader,
    /// Generators.
    Generator,
    /// Transformers.
    Transformer,
    /// Serializers.
    Serializer,
    /// Input modules.
    InputModule,
    /// Flow interpreters.
    Interpreter,
}

impl Role {
    /// Returns the role name used in lookup keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matcher => "matcher",
            Self::Selector => "selector",
            Self::Action => "action",
            Self::Reader => "reader",
            Self::Generator => "generator",
            Self::Transformer => "transformer",
            Self::Serializer => "serializer",
            Self::InputModule => "input-module",
            Self::Interpreter => "interpreter",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "matcher" => Self::Matcher,
            "selector" => Self::Selector,
            "action" => Self::Action,
            "reader" => Self::Reader,
            "generator" => Self::Generator,
            "transformer" => Self::Transformer,
            "serializer" => Self::Serializer,
            "input-module" => Self::InputModule,
            "interpreter" => Self::Interpreter,
            _ => return None,
        })
    }
}

/// A lookup key of the form `role` or `role/type`.
///
/// A key without a type selects the role's default implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    /// The role.
    pub role: Role,
    /// The implementation type, `None` for the default.
    pub type_name: Option<String>,
}

impl ComponentKey {
    /// Creates a key.
    #[must_use]
    pub fn new(role: Role, type_name: Option<&str>) -> Self {
        Self {
            role,
            type_name: type_name.filter(|t| !t.is_empty()).map(String::from),
        }
    }

    /// Parses `role` or `role/type`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown role.
    pub fn parse(key: &str) -> Result<Self, ConfigurationError> {
        let (role, type_name) = match key.split_once('/') {
            Some((role, type_name)) => (role, Some(type_name)),
            None => (key, None),
        };
        let role = Role::parse(role).ok_or_else(|| {
            ConfigurationError::coded(codes::UNKNOWN_COMPONENT, format!("Unknown role in key '{key}'"))
        })?;
        Ok(Self::new(role, type_name))
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_name {
            Some(t) => write!(f, "{}/{}", self.role.as_str(), t),
            None => f.write_str(self.role.as_str()),
        }
    }
}

/// An action as registered: shared across requests, or pooled.
#[derive(Clone)]
pub enum ActionComponent {
    /// Safe for concurrent reuse; invoked without checkout.
    Shared(Arc<dyn Action>),
    /// Checked out per invocation and released afterwards.
    Pooled(Arc<ActionPool>),
}

impl fmt::Debug for ActionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("ActionComponent::Shared"),
            Self::Pooled(pool) => f.debug_tuple("ActionComponent::Pooled").field(pool).finish(),
        }
    }
}

struct RoleTable<T: ?Sized> {
    components: HashMap<String, Arc<T>>,
    default_type: Option<String>,
}

impl<T: ?Sized> Default for RoleTable<T> {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
            default_type: None,
        }
    }
}

impl<T: ?Sized> RoleTable<T> {
    fn insert(&mut self, type_name: String, component: Arc<T>) {
        if self.default_type.is_none() {
            self.default_type = Some(type_name.clone());
        }
        self.components.insert(type_name, component);
    }

    fn lookup(&self, key: &ComponentKey) -> Result<(String, Arc<T>), ConfigurationError> {
        let type_name = key
            .type_name
            .clone()
            .or_else(|| self.default_type.clone())
            .ok_or_else(|| unknown_component(key))?;
        self.components
            .get(&type_name)
            .map(|c| (type_name.clone(), c.clone()))
            .ok_or_else(|| unknown_component(key))
    }
}

fn unknown_component(key: &ComponentKey) -> ConfigurationError {
    ConfigurationError::new(format!("No component registered for '{key}'")).with_error_info(
        ErrorInfo::new(codes::UNKNOWN_COMPONENT, format!("Unknown component '{key}'"))
            .with_fix_hint("Register the component on the ComponentRegistry before building the tree."),
    )
}

/// Registry of every capability the tree builder can inject.
///
/// The first component registered for a role becomes its default unless
/// [`set_default`](Self::set_default) says otherwise.
pub struct ComponentRegistry {
    matchers: RwLock<RoleTable<dyn Matcher>>,
    selectors: RwLock<RoleTable<dyn Selector>>,
    actions: RwLock<HashMap<String, ActionComponent>>,
    default_action: RwLock<Option<String>>,
    readers: RwLock<RoleTable<dyn Reader>>,
    generators: RwLock<RoleTable<dyn Generator>>,
    transformers: RwLock<RoleTable<dyn Transformer>>,
    serializers: RwLock<RoleTable<dyn Serializer>>,
    modules: RwLock<RoleTable<dyn InputModule>>,
    interpreters: RwLock<RoleTable<dyn Interpreter>>,
    source_resolver: RwLock<Arc<dyn SourceResolver>>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self {
            matchers: RwLock::default(),
            selectors: RwLock::default(),
            actions: RwLock::default(),
            default_action: RwLock::default(),
            readers: RwLock::default(),
            generators: RwLock::default(),
            transformers: RwLock::default(),
            serializers: RwLock::default(),
            modules: RwLock::default(),
            interpreters: RwLock::default(),
            source_resolver: RwLock::new(Arc::new(NoSourceResolver)),
        }
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |table: &HashMap<String, _>| -> Vec<String> { table.keys().cloned().collect() };
        f.debug_struct("ComponentRegistry")
            .field("matchers", &self.matchers.read().components.keys().collect::<Vec<_>>())
            .field("selectors", &self.selectors.read().components.keys().collect::<Vec<_>>())
            .field("actions", &names(&self.actions.read()))
            .field("readers", &self.readers.read().components.keys().collect::<Vec<_>>())
            .field("generators", &self.generators.read().components.keys().collect::<Vec<_>>())
            .field("serializers", &self.serializers.read().components.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in components.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_matcher("wildcard", Arc::new(WildcardUriMatcher));
        registry.register_matcher("regexp", Arc::new(RegexpUriMatcher));
        registry.register_selector("request-parameter", Arc::new(RequestParameterSelector));
        registry.register_selector("parameter", Arc::new(ParameterSelector));
        registry.register_serializer("xml", Arc::new(XmlSerializer::default()));
        registry.register_generator("notifying", Arc::new(NotifyingGenerator));
        registry.register_input_module("request-param", Arc::new(RequestParamModule));
        registry.register_input_module("request-header", Arc::new(RequestHeaderModule));
        registry
    }

    /// Registers a matcher.
    pub fn register_matcher(&self, type_name: impl Into<String>, matcher: Arc<dyn Matcher>) {
        self.matchers.write().insert(type_name.into(), matcher);
    }

    /// Registers a selector.
    pub fn register_selector(&self, type_name: impl Into<String>, selector: Arc<dyn Selector>) {
        self.selectors.write().insert(type_name.into(), selector);
    }

    /// Registers an action that is safe for concurrent reuse.
    pub fn register_action(&self, type_name: impl Into<String>, action: Arc<dyn Action>) {
        self.insert_action(type_name.into(), ActionComponent::Shared(action));
    }

    /// Registers an action that must be checked out per invocation.
    pub fn register_pooled_action(&self, type_name: impl Into<String>, factory: ActionFactory) {
        let type_name = type_name.into();
        let pool = Arc::new(ActionPool::new(type_name.clone(), factory));
        self.insert_action(type_name, ActionComponent::Pooled(pool));
    }

    fn insert_action(&self, type_name: String, action: ActionComponent) {
        let mut default = self.default_action.write();
        if default.is_none() {
            *default = Some(type_name.clone());
        }
        self.actions.write().insert(type_name, action);
    }

    /// Registers a reader.
    pub fn register_reader(&self, type_name: impl Into<String>, reader: Arc<dyn Reader>) {
        self.readers.write().insert(type_name.into(), reader);
    }

    /// Registers a generator.
    pub fn register_generator(&self, type_name: impl Into<String>, generator: Arc<dyn Generator>) {
        self.generators.write().insert(type_name.into(), generator);
    }

    /// Registers a transformer.
    pub fn register_transformer(
        &self,
        type_name: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) {
        self.transformers.write().insert(type_name.into(), transformer);
    }

    /// Registers a serializer.
    pub fn register_serializer(&self, type_name: impl Into<String>, serializer: Arc<dyn Serializer>) {
        self.serializers.write().insert(type_name.into(), serializer);
    }

    /// Registers an input module.
    pub fn register_input_module(&self, name: impl Into<String>, module: Arc<dyn InputModule>) {
        self.modules.write().insert(name.into(), module);
    }

    /// Registers a flow interpreter under its language name.
    pub fn register_interpreter(&self, language: impl Into<String>, interpreter: Arc<dyn Interpreter>) {
        self.interpreters.write().insert(language.into(), interpreter);
    }

    /// Replaces the source resolver.
    pub fn set_source_resolver(&self, resolver: Arc<dyn SourceResolver>) {
        *self.source_resolver.write() = resolver;
    }

    /// Sets the default type of a role.
    pub fn set_default(&self, role: Role, type_name: impl Into<String>) {
        let type_name = Some(type_name.into());
        match role {
            Role::Matcher => self.matchers.write().default_type = type_name,
            Role::Selector => self.selectors.write().default_type = type_name,
            Role::Action => *self.default_action.write() = type_name,
            Role::Reader => self.readers.write().default_type = type_name,
            Role::Generator => self.generators.write().default_type = type_name,
            Role::Transformer => self.transformers.write().default_type = type_name,
            Role::Serializer => self.serializers.write().default_type = type_name,
            Role::InputModule => self.modules.write().default_type = type_name,
            Role::Interpreter => self.interpreters.write().default_type = type_name,
        }
    }

    /// Returns true if a component satisfies the key.
    #[must_use]
    pub fn contains(&self, key: &ComponentKey) -> bool {
        match key.role {
            Role::Matcher => self.matchers.read().lookup(key).is_ok(),
            Role::Selector => self.selectors.read().lookup(key).is_ok(),
            Role::Action => self.action(key).is_ok(),
            Role::Reader => self.readers.read().lookup(key).is_ok(),
            Role::Generator => self.generators.read().lookup(key).is_ok(),
            Role::Transformer => self.transformers.read().lookup(key).is_ok(),
            Role::Serializer => self.serializers.read().lookup(key).is_ok(),
            Role::InputModule => self.modules.read().lookup(key).is_ok(),
            Role::Interpreter => self.interpreters.read().lookup(key).is_ok(),
        }
    }

    /// Looks up a matcher; returns the resolved type name with it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn matcher(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Matcher>), ConfigurationError> {
        self.matchers.read().lookup(key)
    }

    /// Looks up a selector.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn selector(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Selector>), ConfigurationError> {
        self.selectors.read().lookup(key)
    }

    /// Looks up an action.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn action(&self, key: &ComponentKey) -> Result<(String, ActionComponent), ConfigurationError> {
        let type_name = key
            .type_name
            .clone()
            .or_else(|| self.default_action.read().clone())
            .ok_or_else(|| unknown_component(key))?;
        self.actions
            .read()
            .get(&type_name)
            .map(|a| (type_name.clone(), a.clone()))
            .ok_or_else(|| unknown_component(key))
    }

    /// Looks up a reader.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn reader(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Reader>), ConfigurationError> {
        self.readers.read().lookup(key)
    }

    /// Looks up a generator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn generator(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Generator>), ConfigurationError> {
        self.generators.read().lookup(key)
    }

    /// Looks up a transformer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn transformer(
        &self,
        key: &ComponentKey,
    ) -> Result<(String, Arc<dyn Transformer>), ConfigurationError> {
        self.transformers.read().lookup(key)
    }

    /// Looks up a serializer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn serializer(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Serializer>), ConfigurationError> {
        self.serializers.read().lookup(key)
    }

    /// Looks up an input module by name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no module has that name.
    pub fn input_module(&self, name: &str) -> Result<Arc<dyn InputModule>, ConfigurationError> {
        let key = ComponentKey::new(Role::InputModule, Some(name));
        self.modules.read().lookup(&key).map(|(_, m)| m)
    }

    /// Looks up an interpreter by language.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing satisfies the key.
    pub fn interpreter(&self, key: &ComponentKey) -> Result<(String, Arc<dyn Interpreter>), ConfigurationError> {
        self.interpreters.read().lookup(key)
    }

    /// Returns the source resolver.
    #[must_use]
    pub fn source_resolver(&self) -> Arc<dyn SourceResolver> {
        self.source_resolver.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse_and_display() {
        let key = ComponentKey::parse("matcher/wildcard").unwrap();
        assert_eq!(key.role, Role::Matcher);
        assert_eq!(key.type_name.as_deref(), Some("wildcard"));
        assert_eq!(key.to_string(), "matcher/wildcard");

        let default_key = ComponentKey::parse("serializer").unwrap();
        assert_eq!(default_key.type_name, None);
        assert_eq!(default_key.to_string(), "serializer");

        assert!(ComponentKey::parse("widget/x").is_err());
    }

    #[test]
    fn test_default_is_first_registered() {
        let registry = ComponentRegistry::with_builtins();
        let (type_name, _) = registry
            .matcher(&ComponentKey::new(Role::Matcher, None))
            .unwrap();
        assert_eq!(type_name, "wildcard");

        registry.set_default(Role::Matcher, "regexp");
        let (type_name, _) = registry
            .matcher(&ComponentKey::new(Role::Matcher, None))
            .unwrap();
        assert_eq!(type_name, "regexp");
    }

    #[test]
    fn test_unknown_component_is_configuration_error() {
        let registry = ComponentRegistry::new();
        let err = registry
            .reader(&ComponentKey::new(Role::Reader, Some("resource")))
            .err()
            .unwrap();
        assert_eq!(err.code(), Some(codes::UNKNOWN_COMPONENT));
        assert!(!registry.contains(&ComponentKey::parse("reader/resource").unwrap()));
    }

    #[test]
    fn test_builtin_modules() {
        let registry = ComponentRegistry::with_builtins();
        assert!(registry.input_module("request-param").is_ok());
        assert!(registry.input_module("session-attr").is_err());
    }
}
