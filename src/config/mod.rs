//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables once at startup.
//!
//! The external route settings are handed to the Site reconciler read-only; the server
//! settings drive the metrics/probe endpoint.

mod controller;
mod server;

pub use controller::{ConfigError, ControllerConfig};
pub use server::ServerConfig;
