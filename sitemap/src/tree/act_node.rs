//! `act` nodes and action-sets.

use super::{invoke_with_map, locate, InvokeContext, Node};
use crate::components::{ActionComponent, MatchResult};
use crate::config::Location;
use crate::core::{Parameters, ACTION_RESULTS};
use crate::environment::{Environment, Redirector};
use crate::errors::SitemapResult;
use crate::variables::{MapStack, ParameterTemplate, VariableResolver};
use std::sync::Arc;

/// Runs a registered action, checking pooled ones out for the call only.
async fn run_action(
    action: &ActionComponent,
    redirector: &Redirector,
    env: &Environment,
    source: &str,
    params: &Parameters,
) -> SitemapResult<Option<MatchResult>> {
    match action {
        ActionComponent::Shared(action) => action.act(redirector, env, source, params).await,
        ActionComponent::Pooled(pool) => {
            let instance = pool.checkout();
            instance.act(redirector, env, source, params).await
        }
    }
}

/// One action of an action-set.
pub struct ActionSetEntry {
    action_name: Option<String>,
    type_name: String,
    action: ActionComponent,
    parameters: ParameterTemplate,
}

impl ActionSetEntry {
    /// Creates an entry. `action_name` restricts it to one requested action.
    #[must_use]
    pub const fn new(
        action_name: Option<String>,
        type_name: String,
        action: ActionComponent,
        parameters: ParameterTemplate,
    ) -> Self {
        Self {
            action_name,
            type_name,
            action,
            parameters,
        }
    }

    fn applies_to(&self, requested: Option<&str>) -> bool {
        match self.action_name.as_deref() {
            None | Some("*") => true,
            Some(name) => requested == Some(name),
        }
    }
}

/// A named bundle of actions invoked by `act set="..."`.
pub struct ActionSet {
    name: String,
    entries: Vec<ActionSetEntry>,
}

impl ActionSet {
    /// Creates an action-set.
    #[must_use]
    pub const fn new(name: String, entries: Vec<ActionSetEntry>) -> Self {
        Self { name, entries }
    }

    /// Returns the set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the entries selected by the request's action.
    ///
    /// An entry with parameters of its own uses them; otherwise it gets the
    /// caller's parameters. Results accumulate into one map; `None` means no
    /// entry produced anything. Each result is also merged into the
    /// request's [`ACTION_RESULTS`] bag, shared by every set the request runs.
    pub async fn call(
        &self,
        redirector: &Redirector,
        env: &Environment,
        maps: &MapStack,
        source: &str,
        caller_params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        let requested = env.action();
        let mut results = MatchResult::new();
        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.applies_to(requested.as_deref()))
        {
            let params = if entry.parameters.is_empty() {
                caller_params.clone()
            } else {
                entry.parameters.resolve(maps, env)?
            };
            tracing::debug!(set = %self.name, action = %entry.type_name, "Running action-set entry");
            if let Some(result) = run_action(&entry.action, redirector, env, source, &params).await? {
                env.object_model().merge_map(ACTION_RESULTS, &result);
                results.extend(result);
            }
            if redirector.has_redirected() {
                break;
            }
        }
        Ok((!results.is_empty()).then_some(results))
    }
}

/// What an `act` node runs.
pub enum ActTarget {
    /// A registered action.
    Action {
        /// Registered type name.
        type_name: String,
        /// The action.
        action: ActionComponent,
    },
    /// A declared action-set.
    Set(Arc<ActionSet>),
}

/// Runs an action and, if it succeeds, its children with the result in scope.
pub struct ActNode {
    name: Option<String>,
    target: ActTarget,
    source: VariableResolver,
    parameters: ParameterTemplate,
    pub(crate) children: Vec<Node>,
    pub(crate) location: Location,
}

impl ActNode {
    /// Creates an act node.
    #[must_use]
    pub const fn new(
        name: Option<String>,
        target: ActTarget,
        source: VariableResolver,
        parameters: ParameterTemplate,
        children: Vec<Node>,
        location: Location,
    ) -> Self {
        Self {
            name,
            target,
            source,
            parameters,
            children,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let redirector = ctx.redirector()?;
        let source = self
            .source
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let params = self
            .parameters
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let result = match &self.target {
            ActTarget::Action { type_name, action } => {
                tracing::debug!(action = %type_name, source = %source, "Running action");
                run_action(action, &redirector, env, &source, &params).await?
            }
            ActTarget::Set(set) => set.call(&redirector, env, ctx.maps(), &source, &params).await?,
        };
        if redirector.has_redirected() {
            return Ok(true);
        }
        match result {
            None => Ok(false),
            Some(values) => invoke_with_map(self.name.as_deref(), values, &self.children, env, ctx).await,
        }
    }
}
