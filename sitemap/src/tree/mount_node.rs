//! `mount`: delegation to a separately compiled sitemap.

use super::{locate, InvokeContext};
use crate::config::Location;
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::events::{SitemapEvent, MOUNT_CREATED, MOUNT_DISPOSED};
use crate::processor::TreeProcessor;
use crate::variables::VariableResolver;
use dashmap::DashMap;
use std::sync::Arc;

/// Mounts a child sitemap under a URI prefix.
///
/// Child processors are created on first use and cached by resolved
/// source, so every request resolving to the same source shares one
/// compiled child tree.
pub struct MountNode {
    source: VariableResolver,
    prefix: VariableResolver,
    pass_through: bool,
    processors: DashMap<String, Arc<TreeProcessor>>,
    pub(crate) location: Location,
}

impl MountNode {
    /// Creates a mount node.
    #[must_use]
    pub fn new(
        source: VariableResolver,
        prefix: VariableResolver,
        pass_through: bool,
        location: Location,
    ) -> Self {
        Self {
            source,
            prefix,
            pass_through,
            processors: DashMap::new(),
            location,
        }
    }

    /// Returns the sources of the child processors created so far.
    #[must_use]
    pub fn cached_processors(&self) -> Vec<String> {
        self.processors.iter().map(|entry| entry.key().clone()).collect()
    }

    fn child_processor(&self, parent: &Arc<TreeProcessor>, source: &str) -> Arc<TreeProcessor> {
        if let Some(child) = self.processors.get(source) {
            return child.value().clone();
        }
        self.processors
            .entry(source.to_string())
            .or_insert_with(|| {
                let child = parent.child(parent.resolve_child_uri(source));
                tracing::info!(source = %source, sitemap = %child.source_uri(), "Mounted sitemap");
                parent.emit(SitemapEvent::new(
                    MOUNT_CREATED,
                    serde_json::json!({ "source": source, "sitemap": child.source_uri() }),
                ));
                child
            })
            .value()
            .clone()
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let source = self
            .source
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        if source.is_empty() {
            return Err(locate(
                SitemapError::processing("Mount source resolved to an empty string"),
                &self.location,
            ));
        }
        let prefix = self
            .prefix
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let parent = ctx.processor().clone();
        let child = self.child_processor(&parent, &source);

        let _addressing = env.save_addressing();
        env.change_context(&prefix, &child.context_uri())
            .map_err(|e| locate(e, &self.location))?;
        env.set_pass_through(self.pass_through);
        tracing::debug!(source = %source, prefix = %prefix, uri = %env.uri(), "Delegating to mount");

        if ctx.is_build_only() {
            return match child.build_pipeline(env).await? {
                Some(pipeline) => {
                    ctx.set_pipeline(pipeline);
                    Ok(true)
                }
                None => Ok(false),
            };
        }
        child.process(env).await
    }

    /// Disposes every cached child processor exactly once.
    pub(crate) fn dispose(&self) {
        let sources = self.cached_processors();
        for source in sources {
            if let Some((source, child)) = self.processors.remove(&source) {
                child.dispose();
                tracing::info!(source = %source, "Disposed mounted sitemap");
                child.emit(SitemapEvent::new(
                    MOUNT_DISPOSED,
                    serde_json::json!({ "source": source, "sitemap": child.source_uri() }),
                ));
            }
        }
    }
}
