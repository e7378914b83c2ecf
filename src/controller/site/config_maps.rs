//! The two ConfigMaps of a Site.
//!
//! - `<site>-config`: nginx server block, immutable, created once
//! - `<site>-data`: one binary entry per page, mirrors the page aggregate

use super::Drift;
use crate::constants::{DATA_MOUNT_PATH, HTTP_PORT, STATIC_CONFIG_FILE};
use crate::controller::cache::{Aggregate, PageDataProvider};
use crate::controller::ownership::{child_metadata, data_config_name, static_config_name};
use crate::crd::Site;
use crate::error::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub(super) fn nginx_server_block() -> String {
    format!(
        r"server {{
    listen {HTTP_PORT};
    server_name _;
    root {DATA_MOUNT_PATH};

    location / {{
        autoindex on;
        default_type text/html;
        try_files $uri $uri/ =404;
    }}
}}
"
    )
}

pub(super) fn desired_static(site: &Site) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: child_metadata(site, static_config_name(&site.name_any()))?,
        data: Some(BTreeMap::from([(
            STATIC_CONFIG_FILE.to_string(),
            nginx_server_block(),
        )])),
        immutable: Some(true),
        ..ConfigMap::default()
    })
}

/// Data blob for `aggregate`; a Site whose aggregate was never computed starts empty
pub(super) fn desired_data(site: &Site, aggregate: Option<&Aggregate>) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: child_metadata(site, data_config_name(&site.name_any()))?,
        binary_data: Some(to_binary_data(aggregate.cloned().unwrap_or_default())),
        ..ConfigMap::default()
    })
}

/// Compare the stored entries with the cached aggregate
///
/// Without a cached aggregate there is nothing to compare against, so the stored
/// blob is left as is until a Page reconcile computes one.
pub(super) fn data_drift(
    pages: &dyn PageDataProvider,
    mut existing: ConfigMap,
    aggregate: Option<&Aggregate>,
) -> Drift<ConfigMap> {
    let Some(aggregate) = aggregate else {
        return Drift::InSync;
    };

    let stored = from_binary_data(existing.binary_data.as_ref());
    if !pages.data_differs(Some(&stored), Some(aggregate)) {
        return Drift::InSync;
    }

    existing.binary_data = Some(to_binary_data(aggregate.clone()));
    existing.data = None;
    Drift::Update(existing)
}

fn to_binary_data(aggregate: Aggregate) -> BTreeMap<String, ByteString> {
    aggregate
        .into_iter()
        .map(|(name, content)| (name, ByteString(content)))
        .collect()
}

fn from_binary_data(binary_data: Option<&BTreeMap<String, ByteString>>) -> Aggregate {
    binary_data
        .map(|entries| {
            entries
                .iter()
                .map(|(name, content)| (name.clone(), content.0.clone()))
                .collect()
        })
        .unwrap_or_default()
}
