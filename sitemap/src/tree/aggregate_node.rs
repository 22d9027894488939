//! `aggregate`: a generator merging several sources.

use super::views::jump_to_view;
use super::{locate, InvokeContext, ViewBinding};
use crate::components::Generator;
use crate::config::{Location, ProcessorConfig};
use crate::core::ElementName;
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::pipeline::{AggregatedPart, ContentAggregator, PipelineStep};
use crate::variables::{MapStack, VariableResolver};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// An element name whose parts are resolved per request.
#[derive(Debug, Clone)]
pub struct ElementTemplate {
    local_name: VariableResolver,
    namespace: VariableResolver,
    prefix: VariableResolver,
}

impl ElementTemplate {
    /// Creates a template.
    #[must_use]
    pub const fn new(
        local_name: VariableResolver,
        namespace: VariableResolver,
        prefix: VariableResolver,
    ) -> Self {
        Self {
            local_name,
            namespace,
            prefix,
        }
    }

    fn resolve(&self, maps: &MapStack, env: &Environment) -> SitemapResult<ElementName> {
        Ok(ElementName::qualified(
            self.namespace.resolve(maps, env)?,
            self.prefix.resolve(maps, env)?,
            self.local_name.resolve(maps, env)?,
        ))
    }
}

/// One declared part.
#[derive(Debug, Clone)]
pub struct AggregatePart {
    source: VariableResolver,
    element: Option<ElementTemplate>,
    strip_root: bool,
    labels: Vec<String>,
}

impl AggregatePart {
    /// Creates a part.
    #[must_use]
    pub const fn new(
        source: VariableResolver,
        element: Option<ElementTemplate>,
        strip_root: bool,
        labels: Vec<String>,
    ) -> Self {
        Self {
            source,
            element,
            strip_root,
            labels,
        }
    }

    /// Returns the part's view labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn resolve(&self, maps: &MapStack, env: &Environment) -> SitemapResult<AggregatedPart> {
        Ok(AggregatedPart {
            source: self.source.resolve(maps, env)?,
            element: self
                .element
                .as_ref()
                .map(|element| element.resolve(maps, env))
                .transpose()?,
            strip_root: self.strip_root,
        })
    }
}

/// Sets a [`ContentAggregator`] as the generator.
///
/// When the requested view's label is carried by some parts, only those
/// parts are aggregated and the request jumps to the view. Otherwise every
/// part is aggregated, unless `strict_view_aggregation` is set, in which
/// case a view that matches no labelled part is an error.
pub struct AggregateNode {
    root: ElementTemplate,
    parts: Arc<[AggregatePart]>,
    view_parts: OnceLock<HashMap<String, Arc<[AggregatePart]>>>,
    views: ViewBinding,
    pub(crate) location: Location,
}

impl AggregateNode {
    /// Creates an aggregate node.
    #[must_use]
    pub fn new(
        root: ElementTemplate,
        parts: Vec<AggregatePart>,
        views: ViewBinding,
        location: Location,
    ) -> Self {
        Self {
            root,
            parts: parts.into(),
            view_parts: OnceLock::new(),
            views,
            location,
        }
    }

    fn subsets(&self) -> &HashMap<String, Arc<[AggregatePart]>> {
        self.view_parts.get_or_init(|| {
            self.views
                .registry()
                .iter()
                .filter_map(|(name, definition)| {
                    let subset: Vec<AggregatePart> = self
                        .parts
                        .iter()
                        .filter(|part| part.labels.contains(&definition.label))
                        .cloned()
                        .collect();
                    (!subset.is_empty()).then(|| (name.to_string(), subset.into()))
                })
                .collect()
        })
    }

    /// Returns the parts to aggregate for a view, and whether they are a
    /// label-filtered subset.
    ///
    /// # Errors
    ///
    /// In strict mode, returns a processing error when a declared view is
    /// requested, some parts carry labels, and none carries the view's.
    pub fn parts_for_view(
        &self,
        view: Option<&str>,
        config: &ProcessorConfig,
    ) -> SitemapResult<(Arc<[AggregatePart]>, bool)> {
        let Some(view) = view else {
            return Ok((self.parts.clone(), false));
        };
        if let Some(subset) = self.subsets().get(view) {
            return Ok((subset.clone(), true));
        }
        let labelled = self.parts.iter().any(|part| !part.labels.is_empty());
        if config.strict_view_aggregation && labelled && self.views.registry().get(view).is_some() {
            return Err(SitemapError::processing(format!(
                "No aggregate part is labelled for view '{view}'"
            )));
        }
        Ok((self.parts.clone(), false))
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let view = env.view();
        let (parts, filtered) = self
            .parts_for_view(view.as_deref(), ctx.config())
            .map_err(|e| locate(e, &self.location))?;
        let root = self
            .root
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let mut aggregator = ContentAggregator::new(root);
        for part in parts.iter() {
            aggregator.add_part(part.resolve(ctx.maps(), env).map_err(|e| locate(e, &self.location))?);
        }
        tracing::debug!(parts = aggregator.parts().len(), filtered, view = ?view, "Aggregating");
        let generator: Arc<dyn Generator> = Arc::new(aggregator);
        ctx.pipeline_mut()
            .set_generator(PipelineStep::new("<aggregator>", generator))
            .map_err(|e| locate(e, &self.location))?;

        if filtered {
            let node = view
                .as_deref()
                .and_then(|view| self.views.registry().get(view))
                .map(|definition| definition.node.clone());
            if let Some(node) = node {
                return node.invoke(env, ctx).await;
            }
        }
        jump_to_view(&self.views, env, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ViewNode, ViewRegistry};
    use pretty_assertions::assert_eq;

    fn part(source: &str, labels: &[&str]) -> AggregatePart {
        AggregatePart::new(
            VariableResolver::literal(source),
            None,
            false,
            labels.iter().map(|l| (*l).to_string()).collect(),
        )
    }

    fn node() -> AggregateNode {
        let mut registry = ViewRegistry::new();
        registry
            .insert("menu".to_string(), ViewNode::new("nav".to_string(), Vec::new()))
            .unwrap();
        registry
            .insert("plain".to_string(), ViewNode::new("plain".to_string(), Vec::new()))
            .unwrap();
        let root = ElementTemplate::new(
            VariableResolver::literal("page"),
            VariableResolver::literal(""),
            VariableResolver::literal(""),
        );
        AggregateNode::new(
            root,
            vec![part("a.xml", &["menu"]), part("b.xml", &[]), part("c.xml", &["menu"])],
            ViewBinding::new(Vec::new(), Arc::new(registry)),
            Location::unknown(),
        )
    }

    fn sources(parts: &[AggregatePart]) -> Vec<&str> {
        parts.iter().map(|p| p.source.expression()).collect()
    }

    #[test]
    fn test_view_subset_is_computed_once() {
        let node = node();
        let config = ProcessorConfig::default();
        let (first, filtered) = node.parts_for_view(Some("nav"), &config).unwrap();
        let (second, _) = node.parts_for_view(Some("nav"), &config).unwrap();

        assert!(filtered);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sources(&first), vec!["a.xml", "c.xml"]);
    }

    #[test]
    fn test_unmatched_view_falls_back_to_all_parts() {
        let node = node();
        let (parts, filtered) = node
            .parts_for_view(Some("plain"), &ProcessorConfig::default())
            .unwrap();

        assert!(!filtered);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_strict_mode_rejects_unmatched_view() {
        let node = node();
        let config = ProcessorConfig::default().with_strict_view_aggregation(true);

        assert!(node.parts_for_view(Some("plain"), &config).is_err());
        assert!(node.parts_for_view(Some("undeclared"), &config).is_ok());
    }
}
