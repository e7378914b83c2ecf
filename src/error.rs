//! # Error Types
//!
//! Errors returned by the Site and Page reconcilers.
//!
//! Not-found on the primary object is never an error (the reconcile simply ends),
//! and not-found on a child is the trigger for creating it. Everything else lands
//! here and is handed back to the scheduler, which owns retries.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the reconcilers
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Ensure step of a Site reconcile, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Workload,
    StaticConfig,
    DataConfig,
    NetworkEndpoint,
    ExternalRoute,
}

impl Step {
    /// All steps in the order a Site reconcile runs them
    pub const ORDER: [Step; 5] = [
        Step::Workload,
        Step::StaticConfig,
        Step::DataConfig,
        Step::NetworkEndpoint,
        Step::ExternalRoute,
    ];

    /// Child kind label used in metrics and log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Workload => "deployment",
            Step::StaticConfig => "static-configmap",
            Step::DataConfig => "data-configmap",
            Step::NetworkEndpoint => "service",
            Step::ExternalRoute => "ingress",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciler error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error other than not-found or conflict
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Optimistic concurrency conflict or already-exists on create
    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object lacks a field the reconciler needs (e.g. namespace, uid)
    #[error("{kind} is missing {field}")]
    MissingField { kind: &'static str, field: &'static str },

    /// Site referenced by a Page does not exist
    #[error("site {namespace}/{name} not found")]
    SiteNotFound { namespace: String, name: String },

    /// Workload found in a shape the controller never produces; it has been deleted
    #[error("deployment '{name}' has {containers} containers (expected 1)")]
    CorruptWorkload { name: String, containers: usize },

    /// An ensure step of a Site reconcile failed
    #[error("failed to reconcile {step}: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<Error>,
    },

    /// The Page reflector stopped before its store was synced
    #[error("page index is not available: {0}")]
    PageIndexUnavailable(#[source] kube_runtime::reflector::store::WriterDropped),

    /// The reconcile call was cancelled before it finished
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap an error with the Site step it happened in
    pub fn in_step(self, step: Step) -> Self {
        match self {
            // Cancellation must stay recognisable to the error policy
            Error::Cancelled => Error::Cancelled,
            other => Error::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Create a missing-field error
    pub fn missing(kind: &'static str, field: &'static str) -> Self {
        Self::MissingField { kind, field }
    }

    /// True when the call was aborted by the cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Short machine-readable label for metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Kube(_) => "kube",
            Error::Conflict { .. } => "conflict",
            Error::Serialization(_) => "serialization",
            Error::MissingField { .. } => "missing_field",
            Error::SiteNotFound { .. } => "site_not_found",
            Error::CorruptWorkload { .. } => "corrupt_workload",
            Error::Step { source, .. } => source.metric_label(),
            Error::PageIndexUnavailable(_) => "page_index",
            Error::Cancelled => "cancelled",
        }
    }
}
