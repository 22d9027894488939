//! Tree processors: one compiled sitemap each.

use crate::builder::TreeBuilder;
use crate::components::ComponentRegistry;
use crate::config::{Configuration, ConfigurationLoader, ProcessorConfig};
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::events::{get_event_sink, EventSink, SitemapEvent, REQUEST_COMPLETED};
use crate::observability::{RequestSpanAttributes, SpanTimer};
use crate::pipeline::ProcessingPipeline;
use crate::tree::{ActionSet, FlowNode, InvokeContext, Node, ViewRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::Instrument;

/// Collaborators shared by a processor and every processor it mounts.
#[derive(Clone)]
pub struct ProcessorServices {
    /// Components available to the trees.
    pub registry: Arc<ComponentRegistry>,
    /// Processor settings.
    pub config: Arc<ProcessorConfig>,
    /// Source of configuration trees.
    pub loader: Arc<dyn ConfigurationLoader>,
    /// Lifecycle event sink.
    pub events: Arc<dyn EventSink>,
}

impl ProcessorServices {
    /// Creates services with default settings and the global event sink.
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, loader: Arc<dyn ConfigurationLoader>) -> Self {
        Self {
            registry,
            config: Arc::new(ProcessorConfig::default()),
            loader,
            events: get_event_sink(),
        }
    }

    /// Sets the processor settings.
    #[must_use]
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl fmt::Debug for ProcessorServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorServices")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A compiled sitemap.
pub struct SitemapTree {
    root: Node,
    views: Arc<ViewRegistry>,
    flow: Option<FlowNode>,
    action_sets: HashMap<String, Arc<ActionSet>>,
}

impl fmt::Debug for SitemapTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SitemapTree")
            .field("root", &self.root)
            .field("views", &self.views.len())
            .field("flow", &self.flow)
            .field("action_sets", &self.action_sets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SitemapTree {
    /// Assembles a tree from its compiled parts.
    #[must_use]
    pub const fn new(
        root: Node,
        views: Arc<ViewRegistry>,
        flow: Option<FlowNode>,
        action_sets: HashMap<String, Arc<ActionSet>>,
    ) -> Self {
        Self {
            root,
            views,
            flow,
            action_sets,
        }
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Returns the declared views.
    #[must_use]
    pub const fn views(&self) -> &Arc<ViewRegistry> {
        &self.views
    }

    /// Returns the flow declaration, if any.
    #[must_use]
    pub const fn flow(&self) -> Option<&FlowNode> {
        self.flow.as_ref()
    }

    /// Returns a declared action-set.
    #[must_use]
    pub fn action_set(&self, name: &str) -> Option<&Arc<ActionSet>> {
        self.action_sets.get(name)
    }

    fn dispose(&self) {
        self.root.dispose();
        self.views.dispose();
    }
}

/// Compiles one sitemap on first use and serves requests with it.
///
/// The compiled tree is immutable and shared by all concurrent requests.
pub struct TreeProcessor {
    source_uri: String,
    services: ProcessorServices,
    preset: Option<Configuration>,
    tree: OnceCell<Arc<SitemapTree>>,
    disposed: AtomicBool,
}

impl fmt::Debug for TreeProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeProcessor")
            .field("source_uri", &self.source_uri)
            .field("compiled", &self.tree.initialized())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl TreeProcessor {
    /// Creates a processor whose tree is loaded from `source_uri`.
    #[must_use]
    pub fn new(source_uri: impl Into<String>, services: ProcessorServices) -> Arc<Self> {
        Arc::new(Self {
            source_uri: source_uri.into(),
            services,
            preset: None,
            tree: OnceCell::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// Creates a processor for an already loaded configuration tree.
    #[must_use]
    pub fn from_configuration(
        source_uri: impl Into<String>,
        config: Configuration,
        services: ProcessorServices,
    ) -> Arc<Self> {
        Arc::new(Self {
            source_uri: source_uri.into(),
            services,
            preset: Some(config),
            tree: OnceCell::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// Creates a processor for a mounted sitemap, sharing this one's services.
    #[must_use]
    pub fn child(&self, source_uri: impl Into<String>) -> Arc<Self> {
        Self::new(source_uri, self.services.clone())
    }

    /// Returns the source of the tree.
    #[must_use]
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Returns the directory of the source, with a trailing `/`, or `""`.
    #[must_use]
    pub fn context_uri(&self) -> String {
        self.source_uri
            .rfind('/')
            .map(|index| self.source_uri[..=index].to_string())
            .unwrap_or_default()
    }

    /// Resolves a mount source against this sitemap's directory.
    ///
    /// A directory source (trailing `/`) names the conventional child
    /// sitemap inside it.
    #[must_use]
    pub fn resolve_child_uri(&self, source: &str) -> String {
        let mut uri = if source.starts_with('/') || source.contains("://") {
            source.to_string()
        } else {
            format!("{}{source}", self.context_uri())
        };
        if uri.ends_with('/') {
            uri.push_str(&self.services.config.child_sitemap_name);
        }
        uri
    }

    /// Returns the processor settings.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.services.config
    }

    /// Returns the component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.services.registry
    }

    /// Emits a lifecycle event.
    pub fn emit(&self, event: SitemapEvent) {
        self.services.events.try_emit(event);
    }

    /// Returns the compiled tree, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns a processing error once disposed, and propagates load and
    /// build failures. A failed compilation is retried on the next call.
    pub async fn tree(&self) -> SitemapResult<Arc<SitemapTree>> {
        if self.is_disposed() {
            return Err(SitemapError::processing(format!(
                "Sitemap '{}' has been disposed",
                self.source_uri
            )));
        }
        self.tree
            .get_or_try_init(|| async {
                let config = match &self.preset {
                    Some(config) => config.clone(),
                    None => self.services.loader.load(&self.source_uri).await?,
                };
                let tree = TreeBuilder::new(&self.services.registry, &self.services.config)
                    .build(&config)?;
                tracing::info!(sitemap = %self.source_uri, views = tree.views().len(), "Compiled sitemap");
                Ok::<_, SitemapError>(Arc::new(tree))
            })
            .await
            .cloned()
    }

    /// Builds and executes the pipeline for a request.
    ///
    /// Returns `false` when nothing handled the request, which only
    /// happens under a pass-through mount.
    ///
    /// # Errors
    ///
    /// Returns unhandled routing and pipeline errors.
    pub async fn process(self: &Arc<Self>, env: &Environment) -> SitemapResult<bool> {
        let attributes = RequestSpanAttributes::capture(env, &self.source_uri);
        let timer = SpanTimer::start();
        let outcome = self
            .invoke(env, false)
            .instrument(attributes.span())
            .await
            .map(|(handled, _)| handled);

        let response = env.response_snapshot();
        self.emit(SitemapEvent::new(
            REQUEST_COMPLETED,
            serde_json::json!({
                "request_id": attributes.request_id,
                "uri": attributes.uri,
                "sitemap": attributes.sitemap,
                "depth": attributes.depth,
                "handled": matches!(outcome, Ok(true)),
                "status": response.status_code(),
                "error": outcome.as_ref().err().map(|e| e.kind().as_str()),
                "duration_ms": timer.elapsed_ms(),
            }),
        ));
        outcome
    }

    /// Builds, without executing, the pipeline for a request.
    ///
    /// # Errors
    ///
    /// Returns unhandled routing errors.
    pub async fn build_pipeline(self: &Arc<Self>, env: &Environment) -> SitemapResult<Option<ProcessingPipeline>> {
        let (handled, pipeline) = self.invoke(env, true).await?;
        Ok(handled.then_some(pipeline))
    }

    async fn invoke(self: &Arc<Self>, env: &Environment, build_only: bool) -> SitemapResult<(bool, ProcessingPipeline)> {
        let tree = self.tree().await?;
        env.init_controls(self.config());
        let mut ctx = InvokeContext::new(self.clone(), build_only);
        let handled = tree.root().invoke(env, &mut ctx).await?;
        let mut pipeline = ctx.take_pipeline();
        if build_only && handled {
            pipeline.bind_scope(self);
        }
        Ok((handled, pipeline))
    }

    /// Disposes the compiled tree and every mounted sitemap. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tree) = self.tree.get() {
            tree.dispose();
        }
        tracing::debug!(sitemap = %self.source_uri, "Disposed sitemap");
    }

    /// Returns true once disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InMemoryConfigurationLoader;
    use pretty_assertions::assert_eq;

    fn processor(source: &str) -> Arc<TreeProcessor> {
        let services = ProcessorServices::new(
            Arc::new(ComponentRegistry::with_builtins()),
            Arc::new(InMemoryConfigurationLoader::new()),
        );
        TreeProcessor::new(source, services)
    }

    #[test]
    fn test_context_uri() {
        assert_eq!(processor("app/sitemap.xmap").context_uri(), "app/");
        assert_eq!(processor("sitemap.xmap").context_uri(), "");
    }

    #[test]
    fn test_resolve_child_uri() {
        let parent = processor("app/sitemap.xmap");
        assert_eq!(parent.resolve_child_uri("admin/"), "app/admin/sitemap.xmap");
        assert_eq!(parent.resolve_child_uri("docs/site.xmap"), "app/docs/site.xmap");
        assert_eq!(parent.resolve_child_uri("/abs/"), "/abs/sitemap.xmap");
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let err = processor("nowhere.xmap").tree().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_disposed_processor_refuses_requests() {
        let processor = processor("sitemap.xmap");
        processor.dispose();
        processor.dispose();

        assert!(processor.is_disposed());
        assert!(processor.tree().await.is_err());
    }
}
