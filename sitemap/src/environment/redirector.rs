//! Redirects issued by actions and flow interpreters.

use super::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::pipeline::ProcessingPipeline;
use crate::processor::TreeProcessor;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sends a request elsewhere.
///
/// `cocoon:/path` forwards to the processor that owns this redirector,
/// `cocoon://path` to the root processor of the request. Any other URI
/// is recorded on the response as an HTTP redirect.
pub struct Redirector {
    processor: Arc<TreeProcessor>,
    redirected: AtomicBool,
}

impl fmt::Debug for Redirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirector")
            .field("redirected", &self.has_redirected())
            .finish_non_exhaustive()
    }
}

impl Redirector {
    /// Creates a redirector scoped to a processor.
    #[must_use]
    pub const fn new(processor: Arc<TreeProcessor>) -> Self {
        Self {
            processor,
            redirected: AtomicBool::new(false),
        }
    }

    /// Redirects the request.
    ///
    /// # Errors
    ///
    /// Propagates failures of a forwarded request, and returns a
    /// not-found error when no pipeline handles it.
    pub async fn redirect(&self, env: &Environment, uri: &str, permanent: bool) -> SitemapResult<()> {
        if let Some((processor, path)) = self.internal_target(env, uri) {
            tracing::debug!(uri = %uri, "Forwarding internal redirect");
            let forwarded = env.forward(path, processor.config().max_internal_depth)?;
            forwarded.set_view(env.view());
            if !processor.process(&forwarded).await? {
                return Err(SitemapError::not_found("No pipeline matched redirect", uri));
            }
        } else {
            tracing::debug!(uri = %uri, permanent, "Sending redirect");
            let mut response = env.response();
            response.status = Some(if permanent { 301 } else { 302 });
            response.location = Some(uri.to_string());
        }
        self.redirected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Builds, without executing, the pipeline an internal redirect targets.
    ///
    /// # Errors
    ///
    /// Returns a processing error for non-internal URIs, since a pipeline
    /// cannot be built for an external redirect, and a not-found error when
    /// the target builds nothing.
    pub async fn build_forward(&self, env: &Environment, uri: &str) -> SitemapResult<ProcessingPipeline> {
        let (processor, path) = self.internal_target(env, uri).ok_or_else(|| {
            SitemapError::processing(format!(
                "Cannot build a pipeline for external redirect '{uri}'"
            ))
        })?;
        let forwarded = env.forward(path, processor.config().max_internal_depth)?;
        forwarded.set_view(env.view());
        let pipeline = processor
            .build_pipeline(&forwarded)
            .await?
            .ok_or_else(|| SitemapError::not_found("No pipeline matched redirect", uri))?;
        self.redirected.store(true, Ordering::SeqCst);
        Ok(pipeline)
    }

    fn internal_target<'u>(&self, env: &Environment, uri: &'u str) -> Option<(Arc<TreeProcessor>, &'u str)> {
        let target = uri.strip_prefix("cocoon:")?;
        Some(match target.strip_prefix("//") {
            Some(path) => (
                env.root_processor().unwrap_or_else(|| self.processor.clone()),
                path,
            ),
            None => (self.processor.clone(), target.trim_start_matches('/')),
        })
    }

    /// Sends a bare status code as the response.
    pub fn send_status(&self, env: &Environment, status: u16) {
        env.response().status = Some(status);
        self.redirected.store(true, Ordering::SeqCst);
    }

    /// Returns true once a redirect or status has been sent.
    #[must_use]
    pub fn has_redirected(&self) -> bool {
        self.redirected.load(Ordering::SeqCst)
    }
}
