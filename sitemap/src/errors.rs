//! Error types for the sitemap processor.
//!
//! The taxonomy separates failures detected while compiling a tree
//! ([`ConfigurationError`]) from failures raised while serving a request
//! ([`ResourceNotFoundError`], [`ProcessingError`], opaque component errors).
//! "No match" is never an error: nodes report it by returning `false`.

use crate::config::Location;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type SitemapResult<T> = Result<T, SitemapError>;

/// The main error type for sitemap operations.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// The tree could not be compiled.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// No pipeline matched the request.
    #[error("{0}")]
    ResourceNotFound(#[from] ResourceNotFoundError),

    /// A processing failure inside the tree or the pipeline.
    #[error("{0}")]
    Processing(#[from] ProcessingError),

    /// A failure reported by an injected collaborator.
    #[error("Component error: {0}")]
    Component(#[from] anyhow::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`SitemapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration error.
    Configuration,
    /// Resource not found.
    NotFound,
    /// Processing failure.
    Processing,
    /// Collaborator failure.
    Component,
}

impl ErrorKind {
    /// Returns the stable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::NotFound => "ResourceNotFound",
            Self::Processing => "ProcessingError",
            Self::Component => "ComponentError",
        }
    }
}

impl SitemapError {
    /// Creates a processing error with a message.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(ProcessingError::new(message))
    }

    /// Creates a resource-not-found error for a URI.
    pub fn not_found(message: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::ResourceNotFound(ResourceNotFoundError::new(message, uri))
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ResourceNotFound(_) => ErrorKind::NotFound,
            Self::Processing(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Processing,
            Self::Component(_) => ErrorKind::Component,
        }
    }

    /// Returns true for resource-not-found errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }

    /// Returns the location attached to the error, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Configuration(e) => e.location.as_ref(),
            Self::Processing(e) => e.location.as_ref(),
            _ => None,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "type".to_string(),
            serde_json::Value::String(self.kind().as_str().to_string()),
        );
        map.insert("message".to_string(), serde_json::Value::String(self.to_string()));
        if let Some(location) = self.location() {
            map.insert("location".to_string(), serde_json::Value::String(location.to_string()));
        }
        if let Self::ResourceNotFound(e) = self {
            map.insert("uri".to_string(), serde_json::Value::String(e.uri.clone()));
        }
        if let Self::Configuration(ConfigurationError { error_info: Some(info), .. }) = self {
            let info_map: serde_json::Map<String, serde_json::Value> =
                info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        }
        map
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "SITEMAP-003-HANDLER_CONFLICT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        map
    }
}

/// Error codes used by the tree builder.
pub mod codes {
    /// Unknown element in the sitemap document.
    pub const UNKNOWN_ELEMENT: &str = "SITEMAP-001-UNKNOWN_ELEMENT";
    /// A required attribute is missing.
    pub const MISSING_ATTRIBUTE: &str = "SITEMAP-002-MISSING_ATTRIBUTE";
    /// Typed and untyped error handlers declared at the same scope.
    pub const HANDLER_CONFLICT: &str = "SITEMAP-003-HANDLER_CONFLICT";
    /// A call node without a flow declaration.
    pub const MISSING_FLOW: &str = "SITEMAP-004-MISSING_FLOW";
    /// A malformed expression or pattern.
    pub const BAD_PATTERN: &str = "SITEMAP-005-BAD_PATTERN";
    /// A component key that the registry cannot satisfy.
    pub const UNKNOWN_COMPONENT: &str = "SITEMAP-006-UNKNOWN_COMPONENT";
    /// An act node with both or neither of `type` and `set`.
    pub const ACT_TARGET: &str = "SITEMAP-007-ACT_TARGET";
    /// A duplicate declaration.
    pub const DUPLICATE: &str = "SITEMAP-008-DUPLICATE";
    /// An error handler that starts content below its first child.
    pub const HANDLER_CONTENT: &str = "SITEMAP-009-HANDLER_CONTENT";
}

/// Error raised while compiling a sitemap tree.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", location_suffix(.location.as_ref()))]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// Where in the document the problem was found.
    pub location: Option<Location>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            error_info: None,
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn at(mut self, location: &Location) -> Self {
        self.location = Some(location.clone());
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Shortcut for an error carrying a code and summary.
    #[must_use]
    pub fn coded(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(message.clone()).with_error_info(ErrorInfo::new(code, message))
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when no pipeline matched a request.
#[derive(Debug, Clone, Error)]
#[error("{message}: {uri}")]
pub struct ResourceNotFoundError {
    /// The error message.
    pub message: String,
    /// The URI that was not found.
    pub uri: String,
}

impl ResourceNotFoundError {
    /// Creates a new error.
    #[must_use]
    pub fn new(message: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            uri: uri.into(),
        }
    }
}

/// Error raised while processing a request.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", location_suffix(.location.as_ref()))]
pub struct ProcessingError {
    /// The error message.
    pub message: String,
    /// The node that raised it.
    pub location: Option<Location>,
}

impl ProcessingError {
    /// Creates a new processing error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn at(mut self, location: &Location) -> Self {
        self.location = Some(location.clone());
        self
    }
}

fn location_suffix(location: Option<&Location>) -> String {
    location.map_or_else(String::new, |l| format!(" (at {l})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display_includes_location() {
        let location = Location::new("sitemap.json", 12, 4);
        let err = ConfigurationError::coded(codes::HANDLER_CONFLICT, "Conflicting handlers")
            .at(&location);

        assert_eq!(err.to_string(), "Conflicting handlers (at sitemap.json:12:4)");
        assert_eq!(err.code(), Some(codes::HANDLER_CONFLICT));
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            SitemapError::not_found("No pipeline matched request", "foo").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(SitemapError::processing("boom").kind(), ErrorKind::Processing);
        assert_eq!(
            SitemapError::from(anyhow::anyhow!("backend down")).kind(),
            ErrorKind::Component
        );
        assert!(SitemapError::not_found("x", "y").is_not_found());
    }

    #[test]
    fn test_error_to_dict() {
        let err = SitemapError::not_found("No pipeline matched request", "docs/index");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "ResourceNotFound");
        assert_eq!(dict.get("uri").unwrap(), "docs/index");
    }

    #[test]
    fn test_configuration_error_dict_carries_info() {
        let err: SitemapError = ConfigurationError::coded(codes::MISSING_FLOW, "No flow").into();
        let dict = err.to_dict();
        let info = dict.get("error_info").unwrap();

        assert_eq!(info["code"], codes::MISSING_FLOW);
    }
}
