//! Content events exchanged between pipeline components.

use serde::{Deserialize, Serialize};

/// A namespaced element name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementName {
    /// Namespace URI, empty for none.
    #[serde(default)]
    pub namespace: String,
    /// Namespace prefix, empty for none.
    #[serde(default)]
    pub prefix: String,
    /// Local name.
    pub local_name: String,
}

impl ElementName {
    /// Creates a name without namespace.
    #[must_use]
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            prefix: String::new(),
            local_name: local_name.into(),
        }
    }

    /// Creates a namespaced name.
    #[must_use]
    pub fn qualified(
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: prefix.into(),
            local_name: local_name.into(),
        }
    }

    /// Returns `prefix:local` or `local`.
    #[must_use]
    pub fn qname(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }
}

/// One content event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SaxEvent {
    /// Start of a document.
    StartDocument,
    /// End of a document.
    EndDocument,
    /// Opening tag.
    StartElement {
        /// Element name.
        name: ElementName,
        /// Attributes in order.
        #[serde(default)]
        attributes: Vec<(String, String)>,
    },
    /// Closing tag.
    EndElement {
        /// Element name.
        name: ElementName,
    },
    /// Text content.
    Characters(String),
}

impl SaxEvent {
    /// Opening tag without namespace or attributes.
    #[must_use]
    pub fn start(local_name: impl Into<String>) -> Self {
        Self::StartElement {
            name: ElementName::local(local_name),
            attributes: Vec::new(),
        }
    }

    /// Closing tag without namespace.
    #[must_use]
    pub fn end(local_name: impl Into<String>) -> Self {
        Self::EndElement {
            name: ElementName::local(local_name),
        }
    }

    /// Text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Characters(text.into())
    }

    /// Returns true for document boundary events.
    #[must_use]
    pub const fn is_document_boundary(&self) -> bool {
        matches!(self, Self::StartDocument | Self::EndDocument)
    }

    /// Wraps a body in start/end document events.
    #[must_use]
    pub fn document(body: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut events = vec![Self::StartDocument];
        events.extend(body);
        events.push(Self::EndDocument);
        events
    }

    /// Builds a document holding one element with text content.
    #[must_use]
    pub fn text_document(element: &str, text: &str) -> Vec<Self> {
        Self::document([Self::start(element), Self::text(text), Self::end(element)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname() {
        assert_eq!(ElementName::local("page").qname(), "page");
        assert_eq!(
            ElementName::qualified("http://example.org/ns", "ex", "page").qname(),
            "ex:page"
        );
    }

    #[test]
    fn test_text_document_shape() {
        let events = SaxEvent::text_document("p", "hi");
        assert_eq!(events.len(), 5);
        assert!(events[0].is_document_boundary());
        assert_eq!(events[2], SaxEvent::text("hi"));
    }
}
