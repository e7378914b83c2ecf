//! # Controller
//!
//! Reconciliation logic for Site and Page resources.
//!
//! ## Sub-modules
//!
//! - `client` - Cluster access seam and its kube-backed implementation
//! - `cache` - Page aggregates shared by the two reconcilers
//! - `conditions` - Condition upsert helpers
//! - `ownership` - Child names, labels and owner references
//! - `site` - Site reconciler and its five ensure steps
//! - `page` - Page reconciler, aggregation, digest and finalizer protocol
//! - `server` - Health probe and metrics HTTP server

pub mod cache;
pub mod client;
pub mod conditions;
pub mod ownership;
pub mod page;
pub mod server;
pub mod site;

pub use cache::{Aggregate, AggregateCache, PageDataProvider};
pub use client::{cancellable, ClusterClient, KubeClusterClient, NamespacedObject};
pub use page::PageReconciler;
pub use site::SiteReconciler;

use crate::error::{Error, Result};
use kube::ResourceExt;
use std::fmt;

/// Namespace + name identity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object delivered by the watch
    pub fn from_resource<K: ResourceExt>(obj: &K, kind: &'static str) -> Result<Self> {
        let namespace = obj
            .namespace()
            .ok_or_else(|| Error::missing(kind, "metadata.namespace"))?;
        Ok(Self::new(namespace, obj.name_any()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
