//! The compiled sitemap tree.
//!
//! A tree is a closed set of node kinds dispatched through
//! [`Node::invoke`]. Invoking a node returns `true` when it (or a
//! descendant) fully handled the request and `false` when the next
//! sibling should be tried. Nodes are immutable once built and are shared
//! by every request; all per-request state lives in the [`Environment`]
//! and the [`InvokeContext`].

mod act_node;
mod aggregate_node;
mod context;
mod error_handler;
mod flow_node;
mod match_node;
mod mount_node;
mod pipeline_node;
mod select_node;
mod terminal;
mod views;

#[cfg(test)]
mod integration_tests;

pub use act_node::{ActNode, ActTarget, ActionSet, ActionSetEntry};
pub use aggregate_node::{AggregateNode, AggregatePart, ElementTemplate};
pub use context::InvokeContext;
pub use error_handler::{ErrorHandlerHelper, HandleErrorsNode};
pub use flow_node::{CallFunctionNode, FlowNode};
pub use match_node::MatchNode;
pub use mount_node::MountNode;
pub use pipeline_node::{PipelineNode, PipelinesNode};
pub use select_node::{SelectCase, SelectNode, SelectStrategy};
pub use terminal::{ComponentBinding, GenerateNode, ReadNode, RedirectNode, SerializeNode, TransformNode};
pub use views::{
    parse_labels, ViewBinding, ViewDefinition, ViewNode, ViewRegistry, FIRST_POSITION,
    LAST_POSITION,
};

use crate::components::MatchResult;
use crate::config::Location;
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;

/// One node of a compiled tree.
pub enum Node {
    /// Root dispatcher over pipelines.
    Pipelines(PipelinesNode),
    /// One pipeline with its error handlers.
    Pipeline(PipelineNode),
    /// Pattern match.
    Match(MatchNode),
    /// Conditional branches.
    Select(SelectNode),
    /// Action or action-set.
    Act(ActNode),
    /// Sets the generator.
    Generate(GenerateNode),
    /// Appends a transformer.
    Transform(TransformNode),
    /// Sets the serializer and completes the pipeline.
    Serialize(SerializeNode),
    /// Sets a reader and completes the pipeline.
    Read(ReadNode),
    /// Aggregates several sources as the generator.
    Aggregate(AggregateNode),
    /// Delegates to a mounted sitemap.
    Mount(MountNode),
    /// Redirects the request.
    Redirect(RedirectNode),
    /// Calls a flow function or continuation.
    Call(CallFunctionNode),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind(), self.location())
    }
}

impl Node {
    /// Invokes the node.
    pub fn invoke<'a>(
        &'a self,
        env: &'a Environment,
        ctx: &'a mut InvokeContext,
    ) -> BoxFuture<'a, SitemapResult<bool>> {
        async move {
            match self {
                Self::Pipelines(node) => node.invoke(env, ctx).await,
                Self::Pipeline(node) => node.invoke(env, ctx).await,
                Self::Match(node) => node.invoke(env, ctx).await,
                Self::Select(node) => node.invoke(env, ctx).await,
                Self::Act(node) => node.invoke(env, ctx).await,
                Self::Generate(node) => node.invoke(env, ctx).await,
                Self::Transform(node) => node.invoke(env, ctx).await,
                Self::Serialize(node) => node.invoke(env, ctx).await,
                Self::Read(node) => node.invoke(env, ctx).await,
                Self::Aggregate(node) => node.invoke(env, ctx).await,
                Self::Mount(node) => node.invoke(env, ctx).await,
                Self::Redirect(node) => node.invoke(env, ctx).await,
                Self::Call(node) => node.invoke(env, ctx).await,
            }
        }
        .boxed()
    }

    /// Returns the element name the node was built from.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pipelines(_) => "pipelines",
            Self::Pipeline(_) => "pipeline",
            Self::Match(_) => "match",
            Self::Select(_) => "select",
            Self::Act(_) => "act",
            Self::Generate(_) => "generate",
            Self::Transform(_) => "transform",
            Self::Serialize(_) => "serialize",
            Self::Read(_) => "read",
            Self::Aggregate(_) => "aggregate",
            Self::Mount(_) => "mount",
            Self::Redirect(_) => "redirect-to",
            Self::Call(_) => "call",
        }
    }

    /// Returns where the node was declared.
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::Pipelines(node) => &node.location,
            Self::Pipeline(node) => &node.location,
            Self::Match(node) => &node.location,
            Self::Select(node) => &node.location,
            Self::Act(node) => &node.location,
            Self::Generate(node) => &node.location,
            Self::Transform(node) => &node.location,
            Self::Serialize(node) => &node.location,
            Self::Read(node) => &node.location,
            Self::Aggregate(node) => &node.location,
            Self::Mount(node) => &node.location,
            Self::Redirect(node) => &node.location,
            Self::Call(node) => &node.location,
        }
    }

    /// Returns true for nodes that set the generator.
    #[must_use]
    pub const fn starts_content(&self) -> bool {
        matches!(self, Self::Generate(_) | Self::Aggregate(_))
    }

    /// Releases mounted sitemaps held anywhere below this node.
    pub fn dispose(&self) {
        match self {
            Self::Pipelines(node) => node.dispose(),
            Self::Pipeline(node) => node.dispose(),
            Self::Match(node) => dispose_all(&node.children),
            Self::Select(node) => node.dispose(),
            Self::Act(node) => dispose_all(&node.children),
            Self::Mount(node) => node.dispose(),
            Self::Generate(_)
            | Self::Transform(_)
            | Self::Serialize(_)
            | Self::Read(_)
            | Self::Aggregate(_)
            | Self::Redirect(_)
            | Self::Call(_) => {}
        }
    }
}

pub(crate) fn dispose_all(nodes: &[Node]) {
    for node in nodes {
        node.dispose();
    }
}

/// Invokes nodes in order until one handles the request.
pub async fn invoke_nodes(
    nodes: &[Node],
    env: &Environment,
    ctx: &mut InvokeContext,
) -> SitemapResult<bool> {
    for node in nodes {
        if node.invoke(env, ctx).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Binds a result map, then invokes the children with the map in scope.
///
/// The map is bound into the object model under `name`, if any, and
/// pushed for `{...}` expressions until the children return.
pub async fn invoke_with_map(
    name: Option<&str>,
    result: MatchResult,
    children: &[Node],
    env: &Environment,
    ctx: &mut InvokeContext,
) -> SitemapResult<bool> {
    if let Some(name) = name {
        env.object_model().bind_map(name, &result);
    }
    ctx.maps_mut().push(name.map(String::from), result);
    let outcome = invoke_nodes(children, env, ctx).await;
    ctx.maps_mut().pop();
    outcome
}

/// Attaches a node location to processing errors that have none.
pub(crate) fn locate(error: SitemapError, location: &Location) -> SitemapError {
    match error {
        SitemapError::Processing(e) if e.location.is_none() => {
            SitemapError::Processing(e.at(location))
        }
        other => other,
    }
}
