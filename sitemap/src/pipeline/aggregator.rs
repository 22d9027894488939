//! Aggregation of several sources into one document.

use super::resolve_events;
use crate::components::Generator;
use crate::core::{ElementName, Parameters, SaxEvent};
use crate::environment::Environment;
use crate::errors::SitemapResult;
use async_trait::async_trait;

/// One resolved part of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedPart {
    /// Source URI.
    pub source: String,
    /// Element wrapped around the part's content.
    pub element: Option<ElementName>,
    /// Drop the part's root element.
    pub strip_root: bool,
}

/// Generator merging the content of its parts under a root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAggregator {
    root: ElementName,
    parts: Vec<AggregatedPart>,
}

impl ContentAggregator {
    /// Creates an aggregator with no parts.
    #[must_use]
    pub const fn new(root: ElementName) -> Self {
        Self {
            root,
            parts: Vec::new(),
        }
    }

    /// Appends a part.
    pub fn add_part(&mut self, part: AggregatedPart) {
        self.parts.push(part);
    }

    /// Returns the parts in order.
    #[must_use]
    pub fn parts(&self) -> &[AggregatedPart] {
        &self.parts
    }
}

fn strip_root(events: &mut Vec<SaxEvent>) {
    if let Some(first) = events
        .iter()
        .position(|e| matches!(e, SaxEvent::StartElement { .. }))
    {
        events.remove(first);
    }
    if let Some(last) = events
        .iter()
        .rposition(|e| matches!(e, SaxEvent::EndElement { .. }))
    {
        events.remove(last);
    }
}

#[async_trait]
impl Generator for ContentAggregator {
    async fn generate(
        &self,
        env: &Environment,
        _source: Option<&str>,
        _params: &Parameters,
    ) -> SitemapResult<Vec<SaxEvent>> {
        let mut body = vec![SaxEvent::StartElement {
            name: self.root.clone(),
            attributes: Vec::new(),
        }];
        for part in &self.parts {
            let mut events = resolve_events(env, &part.source).await?;
            events.retain(|e| !e.is_document_boundary());
            if part.strip_root {
                strip_root(&mut events);
            }
            match &part.element {
                Some(element) => {
                    body.push(SaxEvent::StartElement {
                        name: element.clone(),
                        attributes: Vec::new(),
                    });
                    body.extend(events);
                    body.push(SaxEvent::EndElement {
                        name: element.clone(),
                    });
                }
                None => body.extend(events),
            }
        }
        body.push(SaxEvent::EndElement {
            name: self.root.clone(),
        });
        Ok(SaxEvent::document(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_root_removes_outer_element_only() {
        let mut events = vec![
            SaxEvent::start("doc"),
            SaxEvent::start("p"),
            SaxEvent::text("x"),
            SaxEvent::end("p"),
            SaxEvent::end("doc"),
        ];
        strip_root(&mut events);
        assert_eq!(
            events,
            vec![SaxEvent::start("p"), SaxEvent::text("x"), SaxEvent::end("p")]
        );
    }
}
