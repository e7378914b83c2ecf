//! # Route Configuration
//!
//! External route settings consumed by the Site reconciler.

use crate::constants::DEFAULT_INGRESS_CLASS;
use thiserror::Error;

/// Environment variable holding the external host name (required)
pub const INGRESS_DOMAIN_ENV: &str = "INGRESS_DOMAIN";
/// Environment variable holding the ingress class (optional)
pub const INGRESS_CLASS_ENV: &str = "INGRESS_CLASS";

/// Configuration error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

/// Settings for the external route of every Site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Host the ExternalRoute answers on
    pub ingress_domain: String,
    /// Ingress class of the ExternalRoute
    pub ingress_class: String,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ingress_domain = lookup(INGRESS_DOMAIN_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(INGRESS_DOMAIN_ENV))?;
        let ingress_class = lookup(INGRESS_CLASS_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_INGRESS_CLASS.to_string());

        Ok(Self {
            ingress_domain,
            ingress_class,
        })
    }
}
