//! `match` nodes.

use super::{invoke_with_map, locate, InvokeContext, Node};
use crate::components::{Matcher, PreparableMatcher, PreparedPattern};
use crate::config::Location;
use crate::environment::Environment;
use crate::errors::{ConfigurationError, SitemapResult};
use crate::variables::{ParameterTemplate, VariableResolver};
use std::sync::Arc;

enum MatchStrategy {
    /// Literal pattern compiled once at build time.
    Prepared {
        matcher: Arc<dyn PreparableMatcher>,
        pattern: PreparedPattern,
        source: String,
    },
    /// Pattern resolved per request.
    Dynamic {
        matcher: Arc<dyn Matcher>,
        pattern: VariableResolver,
    },
}

/// Invokes its children when the matcher accepts the request.
pub struct MatchNode {
    name: Option<String>,
    type_name: String,
    strategy: MatchStrategy,
    parameters: ParameterTemplate,
    pub(crate) children: Vec<Node>,
    pub(crate) location: Location,
}

impl MatchNode {
    /// Creates a match node.
    ///
    /// Literal patterns of preparable matchers are compiled here.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the matcher rejects the pattern.
    pub fn new(
        name: Option<String>,
        type_name: String,
        matcher: Arc<dyn Matcher>,
        pattern: VariableResolver,
        parameters: ParameterTemplate,
        children: Vec<Node>,
        location: Location,
    ) -> Result<Self, ConfigurationError> {
        let preparable = if pattern.is_literal() {
            matcher.clone().as_preparable()
        } else {
            None
        };
        let strategy = match preparable {
            Some(preparable) => MatchStrategy::Prepared {
                pattern: preparable
                    .prepare(pattern.expression())
                    .map_err(|e| e.at(&location))?,
                matcher: preparable,
                source: pattern.expression().to_string(),
            },
            None => MatchStrategy::Dynamic { matcher, pattern },
        };
        Ok(Self {
            name,
            type_name,
            strategy,
            parameters,
            children,
            location,
        })
    }

    /// Returns true if the pattern was compiled at build time.
    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        matches!(self.strategy, MatchStrategy::Prepared { .. })
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let params = self
            .parameters
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let (pattern, result) = match &self.strategy {
            MatchStrategy::Prepared {
                matcher,
                pattern,
                source,
            } => (
                source.clone(),
                matcher.prepared_match(pattern, env, &params).await?,
            ),
            MatchStrategy::Dynamic { matcher, pattern } => {
                let pattern = pattern
                    .resolve(ctx.maps(), env)
                    .map_err(|e| locate(e, &self.location))?;
                let result = matcher.matches(&pattern, env, &params).await?;
                (pattern, result)
            }
        };
        let Some(result) = result else {
            tracing::debug!(matcher = %self.type_name, pattern = %pattern, uri = %env.uri(), "No match");
            return Ok(false);
        };
        tracing::debug!(matcher = %self.type_name, pattern = %pattern, uri = %env.uri(), "Matched");
        invoke_with_map(self.name.as_deref(), result, &self.children, env, ctx).await
    }
}
