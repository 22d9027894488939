//! Content pipeline assembly and execution.
//!
//! This module provides:
//! - The pipeline assembled by the tree while it routes a request
//! - The content aggregator used by `aggregate` nodes
//! - Resolution of `cocoon:` and external sources to content events

mod aggregator;
mod processing;
mod source;

pub use aggregator::{AggregatedPart, ContentAggregator};
pub use processing::{PipelineStep, ProcessingPipeline};
pub use source::resolve_events;
