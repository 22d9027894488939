//! `select` nodes.

use super::{invoke_nodes, locate, InvokeContext, Node};
use crate::components::{Selector, SwitchSelector};
use crate::config::Location;
use crate::environment::Environment;
use crate::errors::SitemapResult;
use crate::variables::{ParameterTemplate, VariableResolver};
use std::sync::Arc;

/// How a select node evaluates its tests.
pub enum SelectStrategy {
    /// Builds one selector context per invocation, shared by every test.
    Switch(Arc<dyn SwitchSelector>),
    /// Evaluates every test independently.
    Plain(Arc<dyn Selector>),
}

impl SelectStrategy {
    /// Picks the switch strategy when the selector supports it.
    #[must_use]
    pub fn for_selector(selector: Arc<dyn Selector>) -> Self {
        match selector.clone().as_switch() {
            Some(switch) => Self::Switch(switch),
            None => Self::Plain(selector),
        }
    }
}

/// One `when` branch.
pub struct SelectCase {
    test: VariableResolver,
    children: Vec<Node>,
}

impl SelectCase {
    /// Creates a branch.
    #[must_use]
    pub const fn new(test: VariableResolver, children: Vec<Node>) -> Self {
        Self { test, children }
    }
}

/// Invokes the first branch whose test succeeds, else `otherwise`.
pub struct SelectNode {
    type_name: String,
    strategy: SelectStrategy,
    cases: Vec<SelectCase>,
    otherwise: Option<Vec<Node>>,
    parameters: ParameterTemplate,
    pub(crate) location: Location,
}

impl SelectNode {
    /// Creates a select node.
    #[must_use]
    pub fn new(
        type_name: String,
        strategy: SelectStrategy,
        cases: Vec<SelectCase>,
        otherwise: Option<Vec<Node>>,
        parameters: ParameterTemplate,
        location: Location,
    ) -> Self {
        Self {
            type_name,
            strategy,
            cases,
            otherwise,
            parameters,
            location,
        }
    }

    /// Returns true if tests share a per-invocation selector context.
    #[must_use]
    pub const fn is_switch(&self) -> bool {
        matches!(self.strategy, SelectStrategy::Switch(_))
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let params = self
            .parameters
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let mut chosen = None;
        match &self.strategy {
            SelectStrategy::Switch(selector) => {
                let switch_context = selector.selector_context(env, &params).await?;
                for case in &self.cases {
                    let test = case.test.resolve(ctx.maps(), env).map_err(|e| locate(e, &self.location))?;
                    if selector.select_with(&test, &switch_context) {
                        chosen = Some(case);
                        break;
                    }
                }
            }
            SelectStrategy::Plain(selector) => {
                for case in &self.cases {
                    let test = case.test.resolve(ctx.maps(), env).map_err(|e| locate(e, &self.location))?;
                    if selector.select(&test, env, &params).await? {
                        chosen = Some(case);
                        break;
                    }
                }
            }
        }
        if let Some(case) = chosen {
            tracing::debug!(selector = %self.type_name, test = %case.test.expression(), "Selected branch");
            return invoke_nodes(&case.children, env, ctx).await;
        }
        match &self.otherwise {
            Some(children) => {
                tracing::debug!(selector = %self.type_name, "Selected otherwise branch");
                invoke_nodes(children, env, ctx).await
            }
            None => Ok(false),
        }
    }

    pub(crate) fn dispose(&self) {
        for case in &self.cases {
            super::dispose_all(&case.children);
        }
        if let Some(children) = &self.otherwise {
            super::dispose_all(children);
        }
    }
}
