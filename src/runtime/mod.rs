//! # Runtime Module
//!
//! Runtime components for the Site/Page Controller: initialization, the watch loop
//! that delivers reconcile calls, and the error policy that owns retry backoff.

pub mod backoff;
pub mod context;
pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use backoff::{BackoffTracker, FibonacciBackoff};
pub use context::ControllerContext;
pub use error_policy::*;
pub use initialization::*;
pub use watch_loop::*;
