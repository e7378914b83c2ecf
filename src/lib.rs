//! Site/Page Controller Library
//!
//! Convergence logic for `Site` and `Page` resources: the per-child ensure/diff/update
//! steps, page aggregation and hashing, the finalizer-gated deletion protocol and the
//! cache shared between the two reconcilers.
//! Tests are included in the module files and under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod runtime;

// Re-export CRD types for convenience
pub use crd::*;
pub use error::{Error, Result};
