//! `pipelines` and `pipeline` nodes.

use super::{invoke_nodes, ErrorHandlerHelper, InvokeContext, Node};
use crate::config::Location;
use crate::environment::{Environment, Redirector};
use crate::errors::{SitemapError, SitemapResult};
use std::sync::Arc;

/// Root dispatcher: the first pipeline that handles the request wins.
pub struct PipelinesNode {
    children: Vec<Node>,
    errors: ErrorHandlerHelper,
    pub(crate) location: Location,
}

impl PipelinesNode {
    /// Creates the root node.
    #[must_use]
    pub const fn new(children: Vec<Node>, errors: ErrorHandlerHelper, location: Location) -> Self {
        Self {
            children,
            errors,
            location,
        }
    }

    /// Installs a redirector and the processor scope for the whole
    /// request; both are restored on exit, including on error.
    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let processor = ctx.processor().clone();
        let previous = ctx.set_redirector(Some(Arc::new(Redirector::new(processor.clone()))));
        let outcome = {
            let _scope = env.enter_scope(processor);
            self.dispatch(env, ctx).await
        };
        ctx.set_redirector(previous);
        outcome
    }

    async fn dispatch(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let error = match invoke_nodes(&self.children, env, ctx).await {
            Ok(true) => return Ok(true),
            Ok(false) if env.is_pass_through() => {
                tracing::debug!(uri = %env.uri(), "No pipeline matched, passing through");
                return Ok(false);
            }
            Ok(false) => SitemapError::not_found(
                "No pipeline matched request",
                format!("{}{}", env.prefix(), env.uri()),
            ),
            Err(error) => error,
        };
        self.errors.handle(error, env, ctx).await
    }

    pub(crate) fn dispose(&self) {
        super::dispose_all(&self.children);
        self.errors.dispose();
    }
}

/// A sequence of nodes with optional 404/500 handlers.
pub struct PipelineNode {
    children: Vec<Node>,
    internal_only: bool,
    errors: ErrorHandlerHelper,
    pub(crate) location: Location,
}

impl PipelineNode {
    /// Creates a pipeline node.
    #[must_use]
    pub const fn new(
        children: Vec<Node>,
        internal_only: bool,
        errors: ErrorHandlerHelper,
        location: Location,
    ) -> Self {
        Self {
            children,
            internal_only,
            errors,
            location,
        }
    }

    /// Returns true if external requests are refused.
    #[must_use]
    pub const fn is_internal_only(&self) -> bool {
        self.internal_only
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        if self.internal_only && env.is_external() {
            return Ok(false);
        }
        match invoke_nodes(&self.children, env, ctx).await {
            Ok(handled) => Ok(handled),
            Err(error) => self.errors.handle(error, env, ctx).await,
        }
    }

    pub(crate) fn dispose(&self) {
        super::dispose_all(&self.children);
        self.errors.dispose();
    }
}
