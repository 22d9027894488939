//! Capability providers consumed by the sitemap tree.
//!
//! Every strategy a node needs (matchers, selectors, actions, pipeline
//! components, input modules, flow interpreters) is injected through the
//! [`ComponentRegistry`] and resolved once, while the tree is built.

mod generators;
mod matchers;
mod modules;
mod pool;
mod registry;
mod selectors;
mod serializers;

pub use generators::NotifyingGenerator;
pub use matchers::{RegexpUriMatcher, WildcardUriMatcher};
pub use modules::{RequestHeaderModule, RequestParamModule};
pub use pool::{ActionFactory, ActionPool, PooledAction};
pub use registry::{ActionComponent, ComponentKey, ComponentRegistry, Role};
pub use selectors::{ParameterSelector, RequestParameterSelector};
pub use serializers::XmlSerializer;

use crate::core::{Parameters, SaxEvent};
use crate::environment::{Environment, Redirector};
use crate::errors::{ConfigurationError, SitemapError, SitemapResult};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Values produced by a successful match, selection or action.
pub type MatchResult = HashMap<String, String>;

/// A pattern compiled once by a [`PreparableMatcher`].
pub type PreparedPattern = Arc<dyn Any + Send + Sync>;

/// Per-invocation state built by a [`SwitchSelector`].
pub type SwitchContext = Box<dyn Any + Send + Sync>;

/// Decides whether a request matches a pattern.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Matches a resolved pattern, returning the bound values on success.
    async fn matches(
        &self,
        pattern: &str,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>>;

    /// Returns the preparable view of this matcher, if it has one.
    fn as_preparable(self: Arc<Self>) -> Option<Arc<dyn PreparableMatcher>> {
        None
    }
}

/// A matcher able to compile literal patterns ahead of time.
#[async_trait]
pub trait PreparableMatcher: Send + Sync {
    /// Compiles a pattern.
    fn prepare(&self, pattern: &str) -> Result<PreparedPattern, ConfigurationError>;

    /// Matches against a pattern returned by [`prepare`](Self::prepare).
    async fn prepared_match(
        &self,
        prepared: &PreparedPattern,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>>;
}

/// Evaluates `when` tests of a select node.
#[async_trait]
pub trait Selector: Send + Sync {
    /// Returns true if the resolved test expression selects this branch.
    async fn select(
        &self,
        expression: &str,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<bool>;

    /// Returns the switch view of this selector, if it has one.
    fn as_switch(self: Arc<Self>) -> Option<Arc<dyn SwitchSelector>> {
        None
    }
}

/// A selector that computes its input once per select node invocation.
#[async_trait]
pub trait SwitchSelector: Send + Sync {
    /// Builds the state shared by every test of one invocation.
    async fn selector_context(
        &self,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<SwitchContext>;

    /// Evaluates one test against the shared state.
    fn select_with(&self, expression: &str, context: &SwitchContext) -> bool;
}

/// A side-effecting step guarding a subtree.
#[async_trait]
pub trait Action: Send + Sync {
    /// Runs the action. `None` means the action failed and its subtree is skipped.
    async fn act(
        &self,
        redirector: &Redirector,
        env: &Environment,
        source: &str,
        params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>>;
}

/// Produces a response body directly.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Reads the resource.
    async fn read(
        &self,
        env: &Environment,
        source: Option<&str>,
        params: &Parameters,
    ) -> SitemapResult<Vec<u8>>;

    /// Default content type of the output.
    fn mime_type(&self) -> Option<String> {
        None
    }
}

/// First component of a content pipeline.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produces the content events.
    async fn generate(
        &self,
        env: &Environment,
        source: Option<&str>,
        params: &Parameters,
    ) -> SitemapResult<Vec<SaxEvent>>;
}

/// Middle component of a content pipeline.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Maps the content events.
    async fn transform(
        &self,
        env: &Environment,
        source: Option<&str>,
        params: &Parameters,
        events: Vec<SaxEvent>,
    ) -> SitemapResult<Vec<SaxEvent>>;
}

/// Last component of a content pipeline.
#[async_trait]
pub trait Serializer: Send + Sync {
    /// Renders the content events.
    async fn serialize(
        &self,
        env: &Environment,
        params: &Parameters,
        events: &[SaxEvent],
    ) -> SitemapResult<Vec<u8>>;

    /// Default content type of the output.
    fn mime_type(&self) -> Option<String> {
        None
    }
}

/// Supplies values for `{module:attribute}` expressions.
pub trait InputModule: Send + Sync {
    /// Returns the attribute value, `None` when absent.
    fn attribute(&self, name: &str, env: &Environment) -> SitemapResult<Option<String>>;
}

/// Workflow interpreter bound by a flow declaration.
///
/// Implementations must produce a response through the redirector.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Registers the scripts named by the flow declaration.
    fn register_scripts(&self, _scripts: &[String]) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Calls a top-level function.
    async fn call_function(
        &self,
        function: &str,
        arguments: &[(String, String)],
        redirector: &Redirector,
        env: &Environment,
    ) -> SitemapResult<()>;

    /// Resumes a continuation.
    async fn handle_continuation(
        &self,
        continuation_id: &str,
        arguments: &[(String, String)],
        redirector: &Redirector,
        env: &Environment,
    ) -> SitemapResult<()>;
}

/// Resolves non-`cocoon:` sources to content events.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolves a source URI.
    async fn resolve(&self, uri: &str, env: &Environment) -> SitemapResult<Vec<SaxEvent>>;
}

/// Source resolver used when none is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSourceResolver;

#[async_trait]
impl SourceResolver for NoSourceResolver {
    async fn resolve(&self, uri: &str, _env: &Environment) -> SitemapResult<Vec<SaxEvent>> {
        Err(SitemapError::not_found("No source resolver registered", uri))
    }
}
