//! Per-invocation state.

use crate::config::ProcessorConfig;
use crate::environment::Redirector;
use crate::errors::{SitemapError, SitemapResult};
use crate::pipeline::ProcessingPipeline;
use crate::processor::TreeProcessor;
use crate::variables::MapStack;
use std::sync::Arc;

/// State threaded through one invocation of a tree.
///
/// A context is created per top-level request, per error-handler branch
/// and per mount delegation, and owns exactly one pipeline under
/// construction.
#[derive(Debug)]
pub struct InvokeContext {
    build_only: bool,
    pipeline: ProcessingPipeline,
    maps: MapStack,
    processor: Arc<TreeProcessor>,
    redirector: Option<Arc<Redirector>>,
}

impl InvokeContext {
    /// Creates a context for `processor`.
    ///
    /// With `build_only` the pipeline is assembled but never executed.
    #[must_use]
    pub fn new(processor: Arc<TreeProcessor>, build_only: bool) -> Self {
        Self {
            build_only,
            pipeline: ProcessingPipeline::new(),
            maps: MapStack::new(),
            processor,
            redirector: None,
        }
    }

    /// Creates the context an error handler runs in: same mode, processor
    /// and redirector, fresh pipeline and maps.
    #[must_use]
    pub fn for_error_handler(&self) -> Self {
        Self {
            build_only: self.build_only,
            pipeline: ProcessingPipeline::new(),
            maps: MapStack::new(),
            processor: self.processor.clone(),
            redirector: self.redirector.clone(),
        }
    }

    /// Returns true if the pipeline must not be executed.
    #[must_use]
    pub const fn is_build_only(&self) -> bool {
        self.build_only
    }

    /// Returns the pipeline under construction.
    #[must_use]
    pub const fn pipeline(&self) -> &ProcessingPipeline {
        &self.pipeline
    }

    /// Returns the pipeline under construction, mutably.
    pub fn pipeline_mut(&mut self) -> &mut ProcessingPipeline {
        &mut self.pipeline
    }

    /// Replaces the pipeline, e.g. with one built by a mounted sitemap.
    pub fn set_pipeline(&mut self, pipeline: ProcessingPipeline) {
        self.pipeline = pipeline;
    }

    /// Takes the pipeline, leaving an empty one.
    pub fn take_pipeline(&mut self) -> ProcessingPipeline {
        std::mem::take(&mut self.pipeline)
    }

    /// Returns the result maps of the enclosing nodes.
    #[must_use]
    pub const fn maps(&self) -> &MapStack {
        &self.maps
    }

    /// Returns the result maps mutably.
    pub fn maps_mut(&mut self) -> &mut MapStack {
        &mut self.maps
    }

    /// Returns the processor whose tree is being invoked.
    #[must_use]
    pub const fn processor(&self) -> &Arc<TreeProcessor> {
        &self.processor
    }

    /// Returns the processor configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        self.processor.config()
    }

    /// Returns the redirector installed by the enclosing `pipelines` node.
    ///
    /// # Errors
    ///
    /// Returns a processing error outside a `pipelines` node.
    pub fn redirector(&self) -> SitemapResult<Arc<Redirector>> {
        self.redirector
            .clone()
            .ok_or_else(|| SitemapError::processing("No redirector available outside <pipelines>"))
    }

    /// Installs a redirector, returning the previous one.
    pub fn set_redirector(&mut self, redirector: Option<Arc<Redirector>>) -> Option<Arc<Redirector>> {
        std::mem::replace(&mut self.redirector, redirector)
    }
}
