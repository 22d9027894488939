//! Compilation of configuration trees into sitemap trees.
//!
//! Building happens in a fixed order: views, action-sets, the flow
//! declaration, then the pipelines. Every component is looked up in the
//! registry here, so invoking a built tree never touches the registry.

mod nodes;

use crate::components::{ComponentKey, ComponentRegistry, Interpreter, Role};
use crate::config::{Configuration, ProcessorConfig};
use crate::errors::{codes, ConfigurationError, ErrorInfo};
use crate::processor::SitemapTree;
use crate::tree::{
    ActionSet, ActionSetEntry, ErrorHandlerHelper, FlowNode, HandleErrorsNode, Node,
    PipelineNode, PipelinesNode, ViewNode, ViewRegistry, FIRST_POSITION, LAST_POSITION,
};
use crate::variables::ParameterTemplate;
use std::collections::HashMap;
use std::sync::Arc;

const TOP_LEVEL: &[&str] = &["components", "views", "action-sets", "flow", "pipelines"];

pub(crate) fn unknown_element(config: &Configuration, parent: &str) -> ConfigurationError {
    ConfigurationError::coded(
        codes::UNKNOWN_ELEMENT,
        format!("Element <{}> is not allowed inside <{parent}>", config.name),
    )
    .at(&config.location)
}

fn duplicate(config: &Configuration, what: &str) -> ConfigurationError {
    ConfigurationError::coded(codes::DUPLICATE, format!("{what} is declared twice"))
        .at(&config.location)
}

/// Finds a `generate`, `aggregate` or `read` anywhere below `config`.
fn nested_content_start(config: &Configuration) -> Option<&Configuration> {
    config.children.iter().find_map(|child| match child.name.as_str() {
        "generate" | "aggregate" | "read" => Some(child),
        _ => nested_content_start(child),
    })
}

fn at_most_one<'c>(
    parent: &'c Configuration,
    name: &'c str,
) -> Result<Option<&'c Configuration>, ConfigurationError> {
    let mut found = parent.children_named(name);
    let first = found.next();
    if let Some(second) = found.next() {
        return Err(duplicate(second, &format!("<{name}>")));
    }
    Ok(first)
}

/// Compiles one sitemap document.
pub struct TreeBuilder<'a> {
    registry: &'a ComponentRegistry,
    config: &'a ProcessorConfig,
    views: Arc<ViewRegistry>,
    action_sets: HashMap<String, Arc<ActionSet>>,
    interpreter: Option<Arc<dyn Interpreter>>,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder drawing components from `registry`.
    #[must_use]
    pub fn new(registry: &'a ComponentRegistry, config: &'a ProcessorConfig) -> Self {
        Self {
            registry,
            config,
            views: Arc::new(ViewRegistry::new()),
            action_sets: HashMap::new(),
            interpreter: None,
        }
    }

    /// Returns the processor settings the tree is built for.
    #[must_use]
    pub const fn config(&self) -> &ProcessorConfig {
        self.config
    }

    /// Compiles a `sitemap` document.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found: unknown elements,
    /// missing attributes, unknown components, malformed patterns,
    /// conflicting or duplicate declarations, or `call` without a flow.
    pub fn build(mut self, sitemap: &Configuration) -> Result<SitemapTree, ConfigurationError> {
        if sitemap.name != "sitemap" {
            return Err(ConfigurationError::coded(
                codes::UNKNOWN_ELEMENT,
                format!("Expected <sitemap> as root element, found <{}>", sitemap.name),
            )
            .at(&sitemap.location));
        }
        if let Some(child) = sitemap
            .children
            .iter()
            .find(|child| !TOP_LEVEL.contains(&child.name.as_str()))
        {
            return Err(unknown_element(child, "sitemap"));
        }

        if let Some(views) = at_most_one(sitemap, "views")? {
            self.views = Arc::new(self.build_views(views)?);
        }
        if let Some(sets) = at_most_one(sitemap, "action-sets")? {
            self.build_action_sets(sets)?;
        }
        let flow = at_most_one(sitemap, "flow")?
            .map(|flow| self.build_flow(flow))
            .transpose()?;
        let pipelines = at_most_one(sitemap, "pipelines")?.ok_or_else(|| {
            ConfigurationError::coded(codes::MISSING_ATTRIBUTE, "Sitemap has no <pipelines> element")
                .at(&sitemap.location)
        })?;
        let root = self.build_pipelines(pipelines)?;

        tracing::debug!(
            views = self.views.len(),
            action_sets = self.action_sets.len(),
            flow = flow.is_some(),
            "Built sitemap tree"
        );
        Ok(SitemapTree::new(root, self.views, flow, self.action_sets))
    }

    fn build_views(&self, views: &Configuration) -> Result<ViewRegistry, ConfigurationError> {
        let mut registry = ViewRegistry::new();
        for view in &views.children {
            if view.name != "view" {
                return Err(unknown_element(view, "views"));
            }
            let name = view.required_attribute("name")?;
            let label = match (view.attribute("from-label"), view.attribute("from-position")) {
                (Some(label), _) => label.to_string(),
                (None, Some("first")) => FIRST_POSITION.to_string(),
                (None, Some("last")) => LAST_POSITION.to_string(),
                (None, Some(other)) => {
                    return Err(ConfigurationError::coded(
                        codes::BAD_PATTERN,
                        format!("View '{name}' has unknown position '{other}'"),
                    )
                    .at(&view.location))
                }
                (None, None) => {
                    return Err(ConfigurationError::coded(
                        codes::MISSING_ATTRIBUTE,
                        format!("View '{name}' needs 'from-label' or 'from-position'"),
                    )
                    .at(&view.location))
                }
            };
            let children = self.build_children(view)?;
            registry
                .insert(label, ViewNode::new(name.to_string(), children))
                .map_err(|e| e.at(&view.location))?;
        }
        Ok(registry)
    }

    fn build_action_sets(&mut self, sets: &Configuration) -> Result<(), ConfigurationError> {
        for set in &sets.children {
            if set.name != "action-set" {
                return Err(unknown_element(set, "action-sets"));
            }
            let name = set.required_attribute("name")?;
            let mut entries = Vec::new();
            for act in &set.children {
                if act.name != "act" {
                    return Err(unknown_element(act, "action-set"));
                }
                if act.attribute("set").is_some() {
                    return Err(ConfigurationError::coded(
                        codes::ACT_TARGET,
                        format!("Action-set '{name}' cannot reference another action-set"),
                    )
                    .at(&act.location));
                }
                let key = ComponentKey::new(Role::Action, act.attribute("type"));
                let (type_name, action) = self.registry.action(&key).map_err(|e| e.at(&act.location))?;
                entries.push(ActionSetEntry::new(
                    act.attribute("action").map(String::from),
                    type_name,
                    action,
                    ParameterTemplate::from_config(act, self.registry)?,
                ));
            }
            let previous = self
                .action_sets
                .insert(name.to_string(), Arc::new(ActionSet::new(name.to_string(), entries)));
            if previous.is_some() {
                return Err(duplicate(set, &format!("Action-set '{name}'")));
            }
        }
        Ok(())
    }

    fn build_flow(&mut self, flow: &Configuration) -> Result<FlowNode, ConfigurationError> {
        let language = flow.required_attribute("language")?;
        let key = ComponentKey::new(Role::Interpreter, Some(language));
        let (_, interpreter) = self.registry.interpreter(&key).map_err(|e| e.at(&flow.location))?;
        let mut scripts = Vec::new();
        for script in &flow.children {
            if script.name != "script" {
                return Err(unknown_element(script, "flow"));
            }
            scripts.push(script.required_attribute("src")?.to_string());
        }
        let node = FlowNode::new(language.to_string(), interpreter.clone(), scripts)
            .map_err(|e| e.at(&flow.location))?;
        self.interpreter = Some(interpreter);
        Ok(node)
    }

    fn build_pipelines(&self, pipelines: &Configuration) -> Result<Node, ConfigurationError> {
        let mut children = Vec::new();
        for child in &pipelines.children {
            match child.name.as_str() {
                "pipeline" => children.push(self.build_pipeline(child)?),
                "handle-errors" => {}
                _ => return Err(unknown_element(child, "pipelines")),
            }
        }
        if let Some(second) = pipelines.children_named("handle-errors").nth(1) {
            return Err(duplicate(second, "<handle-errors> of <pipelines>"));
        }
        let errors = self.build_handlers(pipelines)?;
        Ok(Node::Pipelines(PipelinesNode::new(
            children,
            errors,
            pipelines.location.clone(),
        )))
    }

    fn build_pipeline(&self, pipeline: &Configuration) -> Result<Node, ConfigurationError> {
        let internal_only = pipeline.bool_attribute("internal-only", false)?;
        let children = self.build_children(pipeline)?;
        let errors = self.build_handlers(pipeline)?;
        Ok(Node::Pipeline(PipelineNode::new(
            children,
            internal_only,
            errors,
            pipeline.location.clone(),
        )))
    }

    /// Builds the `handle-errors` children of a pipeline or pipelines node.
    ///
    /// An untyped handler takes the `500` slot and excludes typed ones.
    fn build_handlers(&self, parent: &Configuration) -> Result<ErrorHandlerHelper, ConfigurationError> {
        let mut handler_404 = None;
        let mut handler_500 = None;
        let mut untyped = false;
        let declared: Vec<&Configuration> = parent.children_named("handle-errors").collect();
        for handler in &declared {
            let (slot, status) = match handler.attribute("type") {
                None => {
                    untyped = true;
                    (&mut handler_500, 500)
                }
                Some("404") => (&mut handler_404, 404),
                Some("500") => (&mut handler_500, 500),
                Some(other) => {
                    return Err(ConfigurationError::coded(
                        codes::BAD_PATTERN,
                        format!("Unknown handle-errors type '{other}', expected 404 or 500"),
                    )
                    .at(&handler.location))
                }
            };
            if untyped && declared.len() > 1 {
                return Err(ConfigurationError::coded(
                    codes::HANDLER_CONFLICT,
                    "An untyped <handle-errors> cannot be combined with typed ones",
                )
                .with_error_info(
                    ErrorInfo::new(codes::HANDLER_CONFLICT, "Conflicting error handlers")
                        .with_fix_hint("Give every <handle-errors> a type of 404 or 500."),
                )
                .at(&handler.location));
            }
            if slot.is_some() {
                return Err(duplicate(handler, &format!("<handle-errors type=\"{status}\">")));
            }
            let children = self.build_children(handler)?;
            if !children.first().is_some_and(Node::starts_content) {
                if let Some(nested) = nested_content_start(handler) {
                    return Err(ConfigurationError::coded(
                        codes::HANDLER_CONTENT,
                        format!(
                            "<{}> inside <handle-errors> conflicts with the error notification generator",
                            nested.name
                        ),
                    )
                    .with_error_info(
                        ErrorInfo::new(codes::HANDLER_CONTENT, "Nested content in error handler")
                            .with_fix_hint(
                                "Make <generate> or <aggregate> the first child of <handle-errors>, \
                                 or drop it to render the error notification.",
                            ),
                    )
                    .at(&nested.location));
                }
            }
            *slot = Some(HandleErrorsNode::new(status, children, handler.location.clone()));
        }
        Ok(ErrorHandlerHelper::new(handler_404, handler_500))
    }
}
