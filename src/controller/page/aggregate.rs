//! Page aggregation and the aggregate digest.

use crate::controller::cache::Aggregate;
use crate::controller::ObjectKey;
use crate::crd::Page;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::warn;

/// Merge the content of every live Page of `site` into one aggregate
///
/// Pages marked for deletion are excluded. When two Pages declare the same display
/// name the one listed last wins.
pub fn build_aggregate(site: &ObjectKey, pages: &[Page]) -> Aggregate {
    let mut aggregate = Aggregate::new();
    let mut owners: HashMap<&str, String> = HashMap::new();

    for page in pages.iter().filter(|p| !p.is_marked_for_deletion()) {
        let display_name = page.spec.name.as_str();
        if let Some(previous) = owners.insert(display_name, page.name_any()) {
            warn!(
                "Pages {} and {} of site {} both declare name '{}', using {}",
                previous,
                page.name_any(),
                site,
                display_name,
                page.name_any()
            );
        }
        aggregate.insert(
            display_name.to_string(),
            page.spec.content.as_bytes().to_vec(),
        );
    }
    aggregate
}

/// SHA-256 over each key then its value bytes, in key order, base64 encoded
pub fn aggregate_digest(aggregate: &Aggregate) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in aggregate {
        hasher.update(name.as_bytes());
        hasher.update(content);
    }
    STANDARD.encode(hasher.finalize())
}
