//! Test utilities and helpers
//!
//! Recording watchers, a pre-wired in-memory store, and timeout helpers
//! shared by unit and integration tests.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
