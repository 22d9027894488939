//! Processor lifecycle events.
//!
//! Processors emit events to the sink they were built with, falling back
//! to the process-global sink. Event types:
//! - `sitemap.request.completed`
//! - `sitemap.error.handled`
//! - `sitemap.mount.created`
//! - `sitemap.mount.disposed`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, SitemapEvent};

use parking_lot::RwLock;
use std::sync::Arc;

/// A request finished, handled or not.
pub const REQUEST_COMPLETED: &str = "sitemap.request.completed";
/// An error handler produced the response.
pub const ERROR_HANDLED: &str = "sitemap.error.handled";
/// A mount created its child processor.
pub const MOUNT_CREATED: &str = "sitemap.mount.created";
/// A mount disposed a child processor.
pub const MOUNT_DISPOSED: &str = "sitemap.mount.disposed";

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-global event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-global event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the process-global event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_sink_roundtrip() {
        let sink = Arc::new(CollectingEventSink::new());
        set_event_sink(sink.clone());
        get_event_sink().try_emit(SitemapEvent::new(MOUNT_CREATED, serde_json::json!({"src": "a/"})));
        clear_event_sink();
        get_event_sink().try_emit(SitemapEvent::new(MOUNT_DISPOSED, serde_json::Value::Null));

        assert_eq!(sink.events_of_type(MOUNT_CREATED).len(), 1);
        assert!(sink.events_of_type(MOUNT_DISPOSED).is_empty());
    }
}
