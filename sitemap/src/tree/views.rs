//! Views: named alternate outputs reachable from labelled nodes.

use super::{invoke_nodes, InvokeContext, Node};
use crate::environment::Environment;
use crate::errors::{codes, ConfigurationError, SitemapResult};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Label implied on every generator.
pub const FIRST_POSITION: &str = "!first!";

/// Label implied on every serializer.
pub const LAST_POSITION: &str = "!last!";

/// The subtree a view jumps to.
#[derive(Debug)]
pub struct ViewNode {
    name: String,
    children: Vec<Node>,
}

impl ViewNode {
    /// Creates a view node.
    #[must_use]
    pub const fn new(name: String, children: Vec<Node>) -> Self {
        Self { name, children }
    }

    /// Returns the view name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Continues the request in the view instead of the normal path.
    pub async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        tracing::debug!(view = %self.name, uri = %env.uri(), "Jumping to view");
        invoke_nodes(&self.children, env, ctx).await
    }

    pub(crate) fn dispose(&self) {
        super::dispose_all(&self.children);
    }
}

/// A view as declared: the label it intercepts and its subtree.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    /// Label of the nodes the view is reachable from.
    pub label: String,
    /// The view subtree.
    pub node: Arc<ViewNode>,
}

/// All views of a tree, by name.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<String, ViewDefinition>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a view.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a duplicate name.
    pub fn insert(&mut self, label: String, node: ViewNode) -> Result<(), ConfigurationError> {
        let name = node.name.clone();
        if self.views.contains_key(&name) {
            return Err(ConfigurationError::coded(
                codes::DUPLICATE,
                format!("View '{name}' is declared twice"),
            ));
        }
        self.views.insert(
            name,
            ViewDefinition {
                label,
                node: Arc::new(node),
            },
        );
        Ok(())
    }

    /// Returns a view by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ViewDefinition> {
        self.views.get(name)
    }

    /// Iterates over the views.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ViewDefinition)> {
        self.views.iter().map(|(name, view)| (name.as_str(), view))
    }

    /// Returns the number of views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if no view is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub(crate) fn dispose(&self) {
        for view in self.views.values() {
            view.node.dispose();
        }
    }
}

/// The views reachable from one node, resolved on first use.
#[derive(Debug)]
pub struct ViewBinding {
    labels: Vec<String>,
    registry: Arc<ViewRegistry>,
    resolved: OnceLock<HashMap<String, Arc<ViewNode>>>,
}

impl ViewBinding {
    /// Binds a node's labels to the tree's views.
    #[must_use]
    pub const fn new(labels: Vec<String>, registry: Arc<ViewRegistry>) -> Self {
        Self {
            labels,
            registry,
            resolved: OnceLock::new(),
        }
    }

    /// Returns the node's labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the tree's views.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    /// Returns the subtree of the requested view if this node carries its label.
    #[must_use]
    pub fn view_for(&self, view: Option<&str>) -> Option<Arc<ViewNode>> {
        let view = view?;
        self.resolved
            .get_or_init(|| {
                self.registry
                    .iter()
                    .filter(|(_, definition)| self.labels.contains(&definition.label))
                    .map(|(name, definition)| (name.to_string(), definition.node.clone()))
                    .collect()
            })
            .get(view)
            .cloned()
    }
}

/// Jumps to the requested view if `views` reaches it, else reports no match.
pub(crate) async fn jump_to_view(
    views: &ViewBinding,
    env: &Environment,
    ctx: &mut InvokeContext,
) -> SitemapResult<bool> {
    match views.view_for(env.view().as_deref()) {
        Some(view) => view.invoke(env, ctx).await,
        None => Ok(false),
    }
}

/// Splits a `label` attribute on commas and whitespace.
#[must_use]
pub fn parse_labels(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<ViewRegistry> {
        let mut registry = ViewRegistry::new();
        registry
            .insert("content".to_string(), ViewNode::new("content".to_string(), Vec::new()))
            .unwrap();
        registry
            .insert(
                LAST_POSITION.to_string(),
                ViewNode::new("pretty".to_string(), Vec::new()),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_binding_only_reaches_matching_labels() {
        let binding = ViewBinding::new(vec!["content".to_string()], registry());
        assert_eq!(binding.view_for(Some("content")).unwrap().name(), "content");
        assert!(binding.view_for(Some("pretty")).is_none());
        assert!(binding.view_for(None).is_none());
    }

    #[test]
    fn test_binding_resolution_is_cached() {
        let binding = ViewBinding::new(vec![LAST_POSITION.to_string()], registry());
        let first = binding.view_for(Some("pretty")).unwrap();
        let second = binding.view_for(Some("pretty")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_duplicate_view_rejected() {
        let mut registry = ViewRegistry::new();
        registry
            .insert("a".to_string(), ViewNode::new("v".to_string(), Vec::new()))
            .unwrap();
        let err = registry
            .insert("b".to_string(), ViewNode::new("v".to_string(), Vec::new()))
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::DUPLICATE));
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(parse_labels(Some("content, links  raw")), vec!["content", "links", "raw"]);
        assert!(parse_labels(None).is_empty());
    }
}
