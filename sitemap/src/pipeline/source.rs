//! Source resolution.

use crate::core::SaxEvent;
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};

/// Resolves a source URI to content events.
///
/// `cocoon:/path` is built by the processor currently in scope and
/// `cocoon://path` by the root processor, each as an internal request
/// with its own object model. Other URIs go to the registered
/// [`SourceResolver`](crate::components::SourceResolver).
///
/// # Errors
///
/// Returns a not-found error when no pipeline matches an internal source,
/// a processing error when no processor is in scope, and propagates
/// pipeline failures.
pub async fn resolve_events(env: &Environment, uri: &str) -> SitemapResult<Vec<SaxEvent>> {
    let Some(target) = uri.strip_prefix("cocoon:") else {
        let processor = env.current_processor().ok_or_else(|| {
            SitemapError::processing(format!("No processor in scope to resolve '{uri}'"))
        })?;
        return processor.registry().source_resolver().resolve(uri, env).await;
    };
    let (processor, path) = match target.strip_prefix("//") {
        Some(path) => (env.root_processor(), path),
        None => (env.current_processor(), target.trim_start_matches('/')),
    };
    let processor = processor.ok_or_else(|| {
        SitemapError::processing(format!("No processor in scope to resolve '{uri}'"))
    })?;
    tracing::debug!(uri = %uri, "Resolving internal source");
    let internal = env.internal_request(path, processor.config().max_internal_depth)?;
    let pipeline = processor
        .build_pipeline(&internal)
        .await?
        .ok_or_else(|| SitemapError::not_found("No pipeline matched internal source", uri))?;
    pipeline.generate_events(&internal).await
}
