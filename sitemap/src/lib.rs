//! # Sitemap
//!
//! Declarative request routing and content pipeline assembly.
//!
//! A sitemap document is compiled once into an immutable tree of nodes.
//! Each request walks the tree: matchers and selectors pick a branch,
//! actions run and bind their results, and the nodes along the chosen path
//! assemble a content pipeline (generator, transformers, serializer, or a
//! reader) which is then executed. The tree supports:
//!
//! - **Routing**: `match`, `select` and `act` nodes with `{...}` expressions
//! - **Pipelines**: `generate`, `transform`, `serialize`, `read` and `aggregate`
//! - **Delegation**: `mount` of separately compiled sitemaps, cached per source
//! - **Error handling**: `handle-errors` subtrees for 404 and 500 responses
//! - **Views, action-sets and flow calls**
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sitemap::prelude::*;
//!
//! let sitemap = Configuration::new("sitemap").with_child(
//!     Configuration::new("pipelines").with_child(
//!         Configuration::new("pipeline").with_child(
//!             Configuration::new("match")
//!                 .with_attribute("pattern", "docs/*")
//!                 .with_child(Configuration::new("read").with_attribute("src", "{1}.html")),
//!         ),
//!     ),
//! );
//!
//! let services = ProcessorServices::new(Arc::new(registry), Arc::new(loader));
//! let processor = TreeProcessor::from_configuration("sitemap.xmap", sitemap, services);
//!
//! let env = Environment::new("/docs/intro");
//! processor.process(&env).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod components;
pub mod config;
pub mod core;
pub mod environment;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod processor;
pub mod testing;
pub mod tree;
pub mod variables;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::TreeBuilder;
    pub use crate::components::{
        Action, ComponentKey, ComponentRegistry, Generator, Interpreter, MatchResult, Matcher,
        Reader, Role, Selector, Serializer, SourceResolver, Transformer,
    };
    pub use crate::config::{
        Configuration, ConfigurationLoader, FileConfigurationLoader,
        InMemoryConfigurationLoader, Location, ProcessorConfig,
    };
    pub use crate::core::{ElementName, ObjectModel, Parameters, SaxEvent};
    pub use crate::environment::{Environment, Redirector, Response};
    pub use crate::errors::{
        ConfigurationError, ErrorKind, ProcessingError, ResourceNotFoundError, SitemapError,
        SitemapResult,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::processor::{ProcessorServices, SitemapTree, TreeProcessor};
    pub use std::sync::Arc;
}
