//! # Page
//!
//! The Page resource: one named piece of content attached to a Site.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Page Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: webhost.microscaler.io/v1alpha1
/// kind: Page
/// metadata:
///   name: p1
///   namespace: default
/// spec:
///   name: idx
///   content: hello
///   site: s1
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Page",
    group = "webhost.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "PageStatus",
    shortname = "pg",
    printcolumn = r#"{"name":"Site", "type":"string", "jsonPath":".spec.site"}, {"name":"Page", "type":"string", "jsonPath":".spec.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    /// Name of the page as listed in the site index (also its file name)
    pub name: String,
    /// Page contents, served verbatim
    pub content: String,
    /// Name of the Site in the same namespace that serves this page
    pub site: String,
}

/// Observed state of a Page (currently unused)
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "Status must serialize as an object, not null"
)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PageStatus {}

impl Page {
    /// True once the Page has been marked for deletion
    pub fn is_marked_for_deletion(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
