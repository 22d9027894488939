//! Core domain model types for the sitemap processor.
//!
//! This module contains the values that flow through a request:
//! - Ordered component parameters
//! - Content events exchanged between pipeline components
//! - The request-scoped object model
//! - Error notification records

mod content;
mod notification;
mod object_model;
mod parameters;

pub use content::{ElementName, SaxEvent};
pub use notification::Notification;
pub use object_model::{ObjectModel, ACTION_RESULTS, NOTIFYING_OBJECT, THROWABLE_OBJECT};
pub use parameters::Parameters;

/// Returns the current UTC timestamp in ISO 8601 form.
#[must_use]
pub fn iso_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f+00:00")
        .to_string()
}
