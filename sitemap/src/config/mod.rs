//! Configuration for the sitemap processor.
//!
//! This module provides:
//! - Processor settings with serde defaults
//! - The already-parsed configuration tree consumed by the tree builder
//! - Loaders that produce configuration trees for root and mounted sitemaps

mod configuration;
mod loader;
mod settings;

pub use configuration::{Configuration, Location};
pub use loader::{ConfigurationLoader, FileConfigurationLoader, InMemoryConfigurationLoader};
pub use settings::ProcessorConfig;
