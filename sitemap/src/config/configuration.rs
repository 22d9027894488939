//! The parsed configuration tree.

use crate::errors::{codes, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A position in a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Document URI.
    pub uri: String,
    /// Line number (1-based, 0 when unknown).
    #[serde(default)]
    pub line: u32,
    /// Column number (1-based, 0 when unknown).
    #[serde(default)]
    pub column: u32,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub fn new(uri: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            uri: uri.into(),
            line,
            column,
        }
    }

    /// A location for trees built in code.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new("<unknown>", 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.uri, self.line, self.column)
    }
}

/// One element of an already-parsed sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Element name (`match`, `pipeline`, ...).
    pub name: String,
    /// Attributes in document order.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Child elements in document order.
    #[serde(default)]
    pub children: Vec<Configuration>,
    /// Source location.
    #[serde(default)]
    pub location: Location,
}

impl Configuration {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Location::unknown(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Adds a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Adds several child elements.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns a required attribute value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the attribute is absent.
    pub fn required_attribute(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.attribute(name).ok_or_else(|| {
            ConfigurationError::coded(
                codes::MISSING_ATTRIBUTE,
                format!("Missing attribute '{}' on <{}>", name, self.name),
            )
            .at(&self.location)
        })
    }

    /// Returns a boolean attribute, `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is not `true`/`false`/`yes`/`no`.
    pub fn bool_attribute(&self, name: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.attribute(name) {
            None => Ok(default),
            Some("true" | "yes") => Ok(true),
            Some("false" | "no") => Ok(false),
            Some(other) => Err(ConfigurationError::coded(
                codes::BAD_PATTERN,
                format!("Attribute '{}' on <{}> is not a boolean: '{}'", name, self.name, other),
            )
            .at(&self.location)),
        }
    }

    /// Returns the children with a given element name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the first child with a given element name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tree() {
        let json = serde_json::json!({
            "name": "match",
            "attributes": {"pattern": "docs/*", "type": "wildcard"},
            "children": [{"name": "read", "attributes": {"src": "docs/{1}"}}],
            "location": {"uri": "sitemap.json", "line": 3, "column": 7}
        });

        let config: Configuration = serde_json::from_value(json).unwrap();
        assert_eq!(config.attribute("pattern"), Some("docs/*"));
        assert_eq!(config.children_named("read").count(), 1);
        assert_eq!(config.location.to_string(), "sitemap.json:3:7");
    }

    #[test]
    fn test_required_attribute_error() {
        let config = Configuration::new("read");
        let err = config.required_attribute("src").unwrap_err();
        assert_eq!(err.code(), Some(codes::MISSING_ATTRIBUTE));
    }

    #[test]
    fn test_bool_attribute() {
        let config = Configuration::new("pipeline").with_attribute("internal-only", "yes");
        assert!(config.bool_attribute("internal-only", false).unwrap());
        assert!(!config.bool_attribute("pass-through", false).unwrap());

        let bad = Configuration::new("pipeline").with_attribute("internal-only", "maybe");
        assert!(bad.bool_attribute("internal-only", false).is_err());
    }
}
