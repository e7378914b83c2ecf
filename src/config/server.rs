//! # Probe Server Configuration
//!
//! Port and startup behaviour of the `/healthz`, `/readyz` and `/metrics` endpoint.

use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::str::FromStr;

pub const METRICS_PORT_ENV: &str = "METRICS_PORT";
pub const STARTUP_TIMEOUT_ENV: &str = "SERVER_STARTUP_TIMEOUT_SECS";
pub const POLL_INTERVAL_ENV: &str = "SERVER_POLL_INTERVAL_MS";

/// Settings of the probe and metrics server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen port, bound on all interfaces
    pub metrics_port: u16,
    /// Startup fails when the listener is not bound within this many seconds
    pub startup_timeout_secs: u64,
    /// How often startup checks whether the listener is bound
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`; unset or unparsable values keep their default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parsed(&lookup, METRICS_PORT_ENV).unwrap_or(defaults.metrics_port),
            startup_timeout_secs: parsed(&lookup, STARTUP_TIMEOUT_ENV)
                .unwrap_or(defaults.startup_timeout_secs),
            poll_interval_ms: parsed(&lookup, POLL_INTERVAL_ENV)
                .unwrap_or(defaults.poll_interval_ms),
        }
    }
}

fn parsed<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(ServerConfig::from_lookup(|_| None), ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            "METRICS_PORT" => Some("9090".to_string()),
            "SERVER_POLL_INTERVAL_MS" => Some(" 20 ".to_string()),
            _ => None,
        });
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.startup_timeout_secs, 10);
    }

    #[test]
    fn test_unparsable_value_keeps_default() {
        let config = ServerConfig::from_lookup(|key| {
            (key == "METRICS_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.metrics_port, 8080);
    }
}
