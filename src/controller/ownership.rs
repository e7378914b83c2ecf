//! # Ownership and Labeling
//!
//! Child names, identification labels and owner references for the resources a Site
//! owns. Cascade deletion of children is left to the cluster garbage collector, which
//! follows the controller owner reference set here.

use crate::constants::{
    CONTROLLER_NAME, DATA_CONFIG_SUFFIX, LABEL_NAME, LABEL_PART_OF, STATIC_CONFIG_SUFFIX,
};
use crate::crd::Site;
use crate::error::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Name of the Workload, NetworkEndpoint and ExternalRoute of a Site
pub fn workload_name(site_name: &str) -> String {
    site_name.to_string()
}

/// Name of the immutable nginx configuration ConfigMap
pub fn static_config_name(site_name: &str) -> String {
    format!("{site_name}{STATIC_CONFIG_SUFFIX}")
}

/// Name of the ConfigMap mirroring the page aggregate
pub fn data_config_name(site_name: &str) -> String {
    format!("{site_name}{DATA_CONFIG_SUFFIX}")
}

/// Labels applied to every child; also the Workload/NetworkEndpoint selector
pub fn child_labels(site_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), format!("{site_name}-nginx")),
        (LABEL_PART_OF.to_string(), CONTROLLER_NAME.to_string()),
    ])
}

/// Controller owner reference pointing at `site`
pub fn owner_reference(site: &Site) -> Result<OwnerReference> {
    site.controller_owner_ref(&())
        .ok_or_else(|| Error::missing("Site", "metadata.uid"))
}

/// Metadata for a new child of `site`: name, namespace, labels and owner reference
pub fn child_metadata(site: &Site, name: String) -> Result<ObjectMeta> {
    let namespace = site
        .namespace()
        .ok_or_else(|| Error::missing("Site", "metadata.namespace"))?;
    Ok(ObjectMeta {
        name: Some(name),
        namespace: Some(namespace),
        labels: Some(child_labels(&site.name_any())),
        owner_references: Some(vec![owner_reference(site)?]),
        ..ObjectMeta::default()
    })
}
