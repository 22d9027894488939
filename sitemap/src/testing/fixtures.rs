//! Test fixtures: sitemap documents and wired processors.

use std::sync::Arc;

use super::mocks::{
    FailingGenerator, RecordingInterpreter, StaticGenerator, StaticReader, StubAction,
    UppercaseTransformer,
};
use crate::components::{ComponentRegistry, Role};
use crate::config::{Configuration, InMemoryConfigurationLoader, ProcessorConfig};
use crate::events::CollectingEventSink;
use crate::processor::{ProcessorServices, TreeProcessor};

/// Builds `sitemap` configuration trees for tests.
///
/// Components referenced by the helpers are registered by
/// [`TestSitemap::registry`]: reader `echo` (default), generators `echo`
/// (default), `failing` and `missing`, transformer `upper`, actions
/// `stub` (returns `user=ada`) and `deny`, interpreter `test`.
#[derive(Debug, Clone, Default)]
pub struct TestSitemap {
    views: Vec<Configuration>,
    action_sets: Vec<Configuration>,
    flow: Option<Configuration>,
    pipelines: Vec<Configuration>,
    handlers: Vec<Configuration>,
}

impl TestSitemap {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a `from-label` view.
    #[must_use]
    pub fn view(mut self, name: &str, label: &str, child: Configuration) -> Self {
        self.views.push(
            Configuration::new("view")
                .with_attribute("name", name)
                .with_attribute("from-label", label)
                .with_child(child),
        );
        self
    }

    /// Declares a `from-position` view.
    #[must_use]
    pub fn view_at(mut self, name: &str, position: &str, child: Configuration) -> Self {
        self.views.push(
            Configuration::new("view")
                .with_attribute("name", name)
                .with_attribute("from-position", position)
                .with_child(child),
        );
        self
    }

    /// Declares an action-set running the given action types.
    #[must_use]
    pub fn action_set(mut self, name: &str, types: &[&str]) -> Self {
        let acts = types
            .iter()
            .map(|t| Configuration::new("act").with_attribute("type", *t));
        self.action_sets.push(
            Configuration::new("action-set")
                .with_attribute("name", name)
                .with_children(acts),
        );
        self
    }

    /// Declares an action-set from prepared `act` elements.
    #[must_use]
    pub fn raw_action_set(mut self, set: Configuration) -> Self {
        self.action_sets.push(set);
        self
    }

    /// Declares the flow with the `test` interpreter.
    #[must_use]
    pub fn flow(mut self, scripts: &[&str]) -> Self {
        let scripts = scripts
            .iter()
            .map(|s| Configuration::new("script").with_attribute("src", *s));
        self.flow = Some(
            Configuration::new("flow")
                .with_attribute("language", "test")
                .with_children(scripts),
        );
        self
    }

    /// Adds a pipeline holding one node.
    #[must_use]
    pub fn pipeline(self, node: Configuration) -> Self {
        self.raw_pipeline(Configuration::new("pipeline").with_child(node))
    }

    /// Adds a prepared `pipeline` element.
    #[must_use]
    pub fn raw_pipeline(mut self, pipeline: Configuration) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// Adds a `handle-errors` element to `pipelines`.
    #[must_use]
    pub fn handle_errors(mut self, handler: Configuration) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Produces the document.
    #[must_use]
    pub fn build(self) -> Configuration {
        let mut sitemap = Configuration::new("sitemap");
        if !self.views.is_empty() {
            sitemap = sitemap.with_child(Configuration::new("views").with_children(self.views));
        }
        if !self.action_sets.is_empty() {
            sitemap = sitemap
                .with_child(Configuration::new("action-sets").with_children(self.action_sets));
        }
        if let Some(flow) = self.flow {
            sitemap = sitemap.with_child(flow);
        }
        sitemap.with_child(
            Configuration::new("pipelines")
                .with_children(self.pipelines)
                .with_children(self.handlers),
        )
    }

    /// A wired processor for the document, with its event sink.
    #[must_use]
    pub fn processor(self) -> (Arc<TreeProcessor>, Arc<CollectingEventSink>) {
        Self::processor_with(self.build(), Self::registry(), ProcessorConfig::default())
    }

    /// A processor for `sitemap.xmap` with explicit collaborators.
    #[must_use]
    pub fn processor_with(
        sitemap: Configuration,
        registry: ComponentRegistry,
        config: ProcessorConfig,
    ) -> (Arc<TreeProcessor>, Arc<CollectingEventSink>) {
        let (services, events) = Self::services(registry, InMemoryConfigurationLoader::new());
        let processor =
            TreeProcessor::from_configuration("sitemap.xmap", sitemap, services.with_config(config));
        (processor, events)
    }

    /// Services over a loader, with a collecting event sink.
    #[must_use]
    pub fn services(
        registry: ComponentRegistry,
        loader: InMemoryConfigurationLoader,
    ) -> (ProcessorServices, Arc<CollectingEventSink>) {
        let events = Arc::new(CollectingEventSink::new());
        let services = ProcessorServices::new(Arc::new(registry), Arc::new(loader))
            .with_event_sink(events.clone());
        (services, events)
    }

    /// The built-in components plus the test stubs.
    #[must_use]
    pub fn registry() -> ComponentRegistry {
        let registry = ComponentRegistry::with_builtins();
        registry.register_reader("echo", Arc::new(StaticReader::echo()));
        registry.register_generator("echo", Arc::new(StaticGenerator::echo()));
        registry.set_default(Role::Generator, "echo");
        registry.register_generator("failing", Arc::new(FailingGenerator::new("generator failed")));
        registry.register_generator("missing", Arc::new(FailingGenerator::not_found()));
        registry.register_transformer("upper", Arc::new(UppercaseTransformer));
        registry.register_action("stub", Arc::new(StubAction::succeeding(&[("user", "ada")])));
        registry.register_action("deny", Arc::new(StubAction::failing()));
        registry.register_interpreter("test", Arc::new(RecordingInterpreter::new()));
        registry
    }

    /// `match pattern` around `read src`.
    #[must_use]
    pub fn match_read(pattern: &str, src: &str) -> Configuration {
        Configuration::new("match")
            .with_attribute("pattern", pattern)
            .with_child(Self::read(src))
    }

    /// `match pattern` around `generate src` and `serialize`.
    #[must_use]
    pub fn match_generate(pattern: &str, src: &str) -> Configuration {
        Configuration::new("match")
            .with_attribute("pattern", pattern)
            .with_child(Self::generate(src))
            .with_child(Self::serialize())
    }

    /// `read src`.
    #[must_use]
    pub fn read(src: &str) -> Configuration {
        Configuration::new("read").with_attribute("src", src)
    }

    /// `generate src`.
    #[must_use]
    pub fn generate(src: &str) -> Configuration {
        Configuration::new("generate").with_attribute("src", src)
    }

    /// `serialize` without a declaration, for compact bodies.
    #[must_use]
    pub fn serialize() -> Configuration {
        Configuration::new("serialize").with_child(
            Configuration::new("parameter")
                .with_attribute("name", "omit-xml-declaration")
                .with_attribute("value", "true"),
        )
    }
}
