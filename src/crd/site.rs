//! # Site
//!
//! The Site resource: an nginx workload serving the aggregated content of its Pages.

use super::status::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Site Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: webhost.microscaler.io/v1alpha1
/// kind: Site
/// metadata:
///   name: s1
///   namespace: default
/// spec:
///   image: nginx:1.25.3
///   replicaCount: 2
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Site",
    group = "webhost.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "SiteStatus",
    shortname = "site",
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.image"}, {"name":"Replicas", "type":"integer", "jsonPath":".spec.replicaCount"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SiteSpec {
    /// nginx image for the workload, for example `nginx:1.25.3`
    pub image: String,
    /// Number of workload replicas
    #[serde(default = "default_replica_count")]
    #[schemars(range(min = 1))]
    pub replica_count: i32,
}

fn default_replica_count() -> i32 {
    1
}

/// Observed state of a Site
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    /// Conditions, at most one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Site {
    /// Conditions of this Site, empty when no status has been written yet
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}
