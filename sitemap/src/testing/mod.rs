//! Testing utilities for sitemap trees.
//!
//! This module provides:
//! - Stub components with fixed outcomes that record their calls
//! - Sitemap document fixtures and wired processors
//! - Response assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_body, assert_error_kind, assert_redirect, assert_status};
pub use fixtures::TestSitemap;
pub use mocks::{
    FailingGenerator, RecordingInterpreter, RecordingSelector, StaticGenerator, StaticReader,
    StaticSourceResolver, StubAction, StubMatcher, UppercaseTransformer,
};
