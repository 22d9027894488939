//! Expression evaluation for attribute values and patterns.
//!
//! Grammar:
//! - `{1}` or `{name}`: key in the innermost result map
//! - `{../1}`: key in an enclosing result map, one level per `../`
//! - `{#anchor:key}`: key in the map bound by the node named `anchor`
//! - `{module:attribute}`: value of an input module, `attribute` may nest
//! - `\{` and `\}`: literal braces
//!
//! Text without expressions is kept as a literal and never re-parsed.

mod map_stack;
mod resolver;
mod template;

pub use map_stack::{MapFrame, MapStack};
pub use resolver::VariableResolver;
pub use template::ParameterTemplate;
