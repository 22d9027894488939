//! Error notification records.

use super::{ElementName, SaxEvent};
use crate::errors::SitemapError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NOTIFY_NAMESPACE: &str = "http://apache.org/cocoon/error/2.1";
const NOTIFY_PREFIX: &str = "error";

/// Describes a failure to the error-handling subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification type (always `error` for failures).
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Short title.
    pub title: String,
    /// Component or error kind that produced the failure.
    pub source: String,
    /// The error message.
    pub message: String,
    /// Longer description.
    pub description: String,
    /// When the notification was built.
    pub timestamp: String,
    /// Additional details.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Notification {
    /// Builds a notification for an error.
    #[must_use]
    pub fn from_error(error: &SitemapError) -> Self {
        let kind = error.kind();
        let mut extra = BTreeMap::new();
        if let Some(location) = error.location() {
            extra.insert("location".to_string(), location.to_string());
        }
        if let SitemapError::ResourceNotFound(e) = error {
            extra.insert("uri".to_string(), e.uri.clone());
        }
        let mut cause = std::error::Error::source(error);
        let mut depth = 0;
        while let Some(err) = cause {
            extra.insert(format!("cause.{depth}"), err.to_string());
            cause = err.source();
            depth += 1;
        }
        Self {
            notification_type: "error".to_string(),
            title: if error.is_not_found() {
                "Resource Not Found".to_string()
            } else {
                "An Error Occurred".to_string()
            },
            source: kind.as_str().to_string(),
            message: error.to_string(),
            description: error.to_string(),
            timestamp: super::iso_timestamp(),
            extra,
        }
    }

    /// Renders the notification as a content document.
    #[must_use]
    pub fn to_events(&self) -> Vec<SaxEvent> {
        let name = |local: &str| ElementName::qualified(NOTIFY_NAMESPACE, NOTIFY_PREFIX, local);
        let mut body = vec![SaxEvent::StartElement {
            name: name("notify"),
            attributes: vec![
                ("type".to_string(), self.notification_type.clone()),
                ("sender".to_string(), self.source.clone()),
            ],
        }];
        for (element, text) in [
            ("title", &self.title),
            ("source", &self.source),
            ("message", &self.message),
            ("description", &self.description),
        ] {
            body.push(SaxEvent::StartElement {
                name: name(element),
                attributes: Vec::new(),
            });
            body.push(SaxEvent::Characters(text.clone()));
            body.push(SaxEvent::EndElement { name: name(element) });
        }
        for (key, value) in &self.extra {
            body.push(SaxEvent::StartElement {
                name: name("extra"),
                attributes: vec![("description".to_string(), key.clone())],
            });
            body.push(SaxEvent::Characters(value.clone()));
            body.push(SaxEvent::EndElement { name: name("extra") });
        }
        body.push(SaxEvent::EndElement { name: name("notify") });
        SaxEvent::document(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_not_found_error() {
        let err = SitemapError::not_found("No pipeline matched request", "missing");
        let notification = Notification::from_error(&err);

        assert_eq!(notification.title, "Resource Not Found");
        assert_eq!(notification.source, "ResourceNotFound");
        assert_eq!(notification.extra.get("uri").unwrap(), "missing");
    }

    #[test]
    fn test_to_events_is_a_document() {
        let notification = Notification::from_error(&SitemapError::processing("boom"));
        let events = notification.to_events();

        assert_eq!(events.first(), Some(&SaxEvent::StartDocument));
        assert_eq!(events.last(), Some(&SaxEvent::EndDocument));
        assert!(events.contains(&SaxEvent::Characters("boom".to_string())));
    }
}
