//! Processor settings.

use serde::{Deserialize, Serialize};

/// Settings shared by a root processor and every sitemap mounted below it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// File name appended to directory-style mount sources.
    #[serde(default = "default_child_sitemap_name")]
    pub child_sitemap_name: String,
    /// Request parameter naming the requested view.
    #[serde(default = "default_view_parameter")]
    pub view_parameter: String,
    /// Request parameter naming the requested action inside action-sets.
    #[serde(default = "default_action_parameter")]
    pub action_parameter: String,
    /// Fail instead of aggregating every part when no part matches the requested view.
    #[serde(default)]
    pub strict_view_aggregation: bool,
    /// Maximum nesting of internal requests and mounts.
    #[serde(default = "default_max_internal_depth")]
    pub max_internal_depth: usize,
}

fn default_child_sitemap_name() -> String {
    "sitemap.xmap".to_string()
}

fn default_view_parameter() -> String {
    "cocoon-view".to_string()
}

fn default_action_parameter() -> String {
    "cocoon-action".to_string()
}

const fn default_max_internal_depth() -> usize {
    16
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            child_sitemap_name: default_child_sitemap_name(),
            view_parameter: default_view_parameter(),
            action_parameter: default_action_parameter(),
            strict_view_aggregation: false,
            max_internal_depth: default_max_internal_depth(),
        }
    }
}

impl ProcessorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the child sitemap file name.
    #[must_use]
    pub fn with_child_sitemap_name(mut self, name: impl Into<String>) -> Self {
        self.child_sitemap_name = name.into();
        self
    }

    /// Sets the view request parameter.
    #[must_use]
    pub fn with_view_parameter(mut self, name: impl Into<String>) -> Self {
        self.view_parameter = name.into();
        self
    }

    /// Sets the action request parameter.
    #[must_use]
    pub fn with_action_parameter(mut self, name: impl Into<String>) -> Self {
        self.action_parameter = name.into();
        self
    }

    /// Enables or disables strict view aggregation.
    #[must_use]
    pub fn with_strict_view_aggregation(mut self, strict: bool) -> Self {
        self.strict_view_aggregation = strict;
        self
    }

    /// Sets the maximum internal request depth.
    #[must_use]
    pub fn with_max_internal_depth(mut self, depth: usize) -> Self {
        self.max_internal_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.child_sitemap_name, "sitemap.xmap");
        assert_eq!(config.view_parameter, "cocoon-view");
        assert_eq!(config.action_parameter, "cocoon-action");
        assert!(!config.strict_view_aggregation);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ProcessorConfig =
            serde_json::from_str(r#"{"strict_view_aggregation": true}"#).unwrap();
        assert!(config.strict_view_aggregation);
        assert_eq!(config.max_internal_depth, 16);
    }
}
