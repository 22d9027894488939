//! Configuration loaders.

use super::Configuration;
use crate::errors::{SitemapError, SitemapResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;

/// Produces parsed configuration trees for sitemap sources.
#[async_trait]
pub trait ConfigurationLoader: Send + Sync {
    /// Loads the configuration tree for a source URI.
    async fn load(&self, uri: &str) -> SitemapResult<Configuration>;
}

/// Loads JSON-encoded configuration trees from the file system.
#[derive(Debug, Clone)]
pub struct FileConfigurationLoader {
    base_dir: PathBuf,
}

impl FileConfigurationLoader {
    /// Creates a loader resolving relative URIs against `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, uri: &str) -> PathBuf {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }
}

#[async_trait]
impl ConfigurationLoader for FileConfigurationLoader {
    async fn load(&self, uri: &str) -> SitemapResult<Configuration> {
        let path = self.path_for(uri);
        tracing::debug!(uri = %uri, path = %path.display(), "Loading sitemap configuration");
        let text = tokio::fs::read_to_string(&path).await?;
        let mut config: Configuration = serde_json::from_str(&text)?;
        if config.location.uri.is_empty() {
            config.location.uri = uri.to_string();
        }
        Ok(config)
    }
}

/// Serves configuration trees registered in memory.
#[derive(Debug, Default)]
pub struct InMemoryConfigurationLoader {
    documents: RwLock<HashMap<String, Configuration>>,
}

impl InMemoryConfigurationLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document under a URI.
    pub fn insert(&self, uri: impl Into<String>, config: Configuration) {
        self.documents.write().insert(uri.into(), config);
    }

    /// Registers a document, builder style.
    #[must_use]
    pub fn with_document(self, uri: impl Into<String>, config: Configuration) -> Self {
        self.insert(uri, config);
        self
    }
}

#[async_trait]
impl ConfigurationLoader for InMemoryConfigurationLoader {
    async fn load(&self, uri: &str) -> SitemapResult<Configuration> {
        self.documents.read().get(uri).cloned().ok_or_else(|| {
            SitemapError::not_found("No sitemap configuration registered", uri)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_loader_reads_json_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("sitemap.xmap")).unwrap();
        write!(
            file,
            r#"{{"name": "sitemap", "children": [{{"name": "pipelines"}}]}}"#
        )
        .unwrap();

        let loader = FileConfigurationLoader::new(dir.path());
        let config = loader.load("sitemap.xmap").await.unwrap();

        assert_eq!(config.name, "sitemap");
        assert_eq!(config.location.uri, "sitemap.xmap");
        assert!(config.child("pipelines").is_some());
    }

    #[tokio::test]
    async fn test_file_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileConfigurationLoader::new(dir.path());
        let err = loader.load("absent.xmap").await.unwrap_err();
        assert!(matches!(err, SitemapError::Io(_)));
    }

    #[tokio::test]
    async fn test_in_memory_loader() {
        let loader = InMemoryConfigurationLoader::new()
            .with_document("main.xmap", Configuration::new("sitemap"));

        assert_eq!(loader.load("main.xmap").await.unwrap().name, "sitemap");
        assert!(loader.load("other.xmap").await.unwrap_err().is_not_found());
    }
}
