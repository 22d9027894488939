//! The per-request environment.
//!
//! An [`Environment`] carries the request addressing, the object model,
//! the response under construction and the processor scope. Nodes only
//! ever receive it by shared reference; everything a node may change is
//! behind interior mutability so that one request can flow through a
//! tree shared by many.

mod redirector;
mod request;
mod response;

pub use redirector::Redirector;
pub use request::{AddressingGuard, Environment, ScopeGuard};
pub use response::Response;
