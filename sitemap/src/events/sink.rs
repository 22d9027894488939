//! Event sink trait and implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEvent {
    /// Event type, one of the constants of [`crate::events`].
    pub event_type: String,
    /// When the event was emitted.
    pub timestamp: String,
    /// Event payload.
    pub data: serde_json::Value,
}

impl SitemapEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::core::iso_timestamp(),
            data,
        }
    }
}

/// Receives processor lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event without blocking. Must never fail.
    fn try_emit(&self, event: SitemapEvent);

    /// Emits an event asynchronously.
    async fn emit(&self, event: SitemapEvent) {
        self.try_emit(event);
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: SitemapEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level` (debug or info).
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: SitemapEvent) {
        if self.level == Level::DEBUG {
            debug!(event_type = %event.event_type, event_data = %event.data, "Event: {}", event.event_type);
        } else {
            info!(event_type = %event.event_type, event_data = %event.data, "Event: {}", event.event_type);
        }
    }
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<SitemapEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<SitemapEvent> {
        self.events.read().clone()
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<SitemapEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: SitemapEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collecting_sink_filter_and_clear() {
        let sink = CollectingEventSink::new();
        sink.emit(SitemapEvent::new("sitemap.mount.created", serde_json::Value::Null))
            .await;
        sink.try_emit(SitemapEvent::new(
            "sitemap.request.completed",
            serde_json::json!({"handled": true}),
        ));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events_of_type("sitemap.mount.").len(), 1);
        assert_eq!(sink.events()[1].data["handled"], true);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit(SitemapEvent::new("x", serde_json::Value::Null)).await;
        LoggingEventSink::debug().try_emit(SitemapEvent::new("x", serde_json::json!({"a": 1})));
    }
}
