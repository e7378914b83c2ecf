//! # Observability
//!
//! Prometheus metrics for the Site and Page reconcilers. Logging goes through
//! `tracing` and is configured at startup.

pub mod metrics;
