//! Observability utilities.

mod spans;
mod subscriber;

pub use spans::{RequestSpanAttributes, SpanTimer};
pub use subscriber::{init_tracing, LogFormat};
