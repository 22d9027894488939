//! Request span attributes and timing.

use crate::environment::Environment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Attributes recorded on the span of one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSpanAttributes {
    /// Request id shared by nested requests.
    pub request_id: String,
    /// URI relative to the processor.
    pub uri: String,
    /// Prefix consumed by enclosing mounts.
    pub prefix: String,
    /// Source of the processor's tree.
    pub sitemap: String,
    /// Requested view.
    pub view: Option<String>,
    /// Whether the request came from outside.
    pub external: bool,
    /// Internal request depth.
    pub depth: usize,
}

impl RequestSpanAttributes {
    /// Captures the attributes of a request entering a processor.
    #[must_use]
    pub fn capture(env: &Environment, sitemap: &str) -> Self {
        Self {
            request_id: env.request_id().to_string(),
            uri: env.uri(),
            prefix: env.prefix(),
            sitemap: sitemap.to_string(),
            view: env.view(),
            external: env.is_external(),
            depth: env.depth(),
        }
    }

    /// Builds the `tracing` span for the request.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "sitemap.request",
            request_id = %self.request_id,
            uri = %self.uri,
            prefix = %self.prefix,
            sitemap = %self.sitemap,
            view = ?self.view,
            external = self.external,
            depth = self.depth,
        )
    }

    /// Converts to flat key/value attributes.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("request.id".to_string(), self.request_id.clone());
        attrs.insert("request.uri".to_string(), self.uri.clone());
        attrs.insert("request.prefix".to_string(), self.prefix.clone());
        attrs.insert("sitemap.source".to_string(), self.sitemap.clone());
        if let Some(ref view) = self.view {
            attrs.insert("request.view".to_string(), view.clone());
        }
        attrs.insert("request.external".to_string(), self.external.to_string());
        attrs.insert("request.depth".to_string(), self.depth.to_string());
        attrs
    }
}

/// Measures the duration of a request.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
}

impl SpanTimer {
    /// Starts timing.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_attributes() {
        let env = Environment::new("docs/index?cocoon-view=links");
        env.init_controls(&crate::config::ProcessorConfig::default());
        let attrs = RequestSpanAttributes::capture(&env, "sitemap.xmap");

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("request.uri").map(String::as_str), Some("docs/index"));
        assert_eq!(flat.get("request.view").map(String::as_str), Some("links"));
        assert_eq!(flat.get("request.external").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_span_timer_is_monotonic() {
        let timer = SpanTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5.0);
    }
}
