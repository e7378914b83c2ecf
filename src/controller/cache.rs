//! # Aggregate Cache
//!
//! Last computed page aggregate per Site, shared between the Page reconciler (writer)
//! and the Site reconciler (reader).
//!
//! The cache is in-memory only. After a restart it is empty until Page reconciles
//! repopulate it; the Site reconciler treats an absent entry as "not computed yet".

use super::ObjectKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Page name -> page content bytes for one Site
///
/// Ordered by key so the digest and the rendered ConfigMap are deterministic.
pub type Aggregate = BTreeMap<String, Vec<u8>>;

/// Read side of the aggregate cache, as seen by the Site reconciler
pub trait PageDataProvider: Send + Sync {
    /// Current aggregate for `site`, `None` when never computed
    fn get_data(&self, site: &ObjectKey) -> Option<Aggregate>;

    /// Forget the aggregate of a deleted Site
    fn forget(&self, site: &ObjectKey);

    /// True when two aggregates differ in presence, size, keys or bytes
    fn data_differs(&self, current: Option<&Aggregate>, desired: Option<&Aggregate>) -> bool {
        AggregateCache::differs(current, desired)
    }
}

/// Map from Site key to its last computed aggregate
#[derive(Debug, Default)]
pub struct AggregateCache {
    entries: Mutex<HashMap<ObjectKey, Aggregate>>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the aggregate for `site`
    pub fn get(&self, site: &ObjectKey) -> Option<Aggregate> {
        self.lock().get(site).cloned()
    }

    /// Store `desired` for `site` only if the entry still equals `expected`
    ///
    /// `None` on either side means "no entry". Returns `false`, leaving the entry
    /// untouched, when another reconcile wrote it since `expected` was read.
    pub fn compare_and_set(
        &self,
        site: &ObjectKey,
        expected: Option<&Aggregate>,
        desired: Option<Aggregate>,
    ) -> bool {
        let mut entries = self.lock();
        if Self::differs(entries.get(site), expected) {
            return false;
        }
        match desired {
            Some(aggregate) => {
                entries.insert(site.clone(), aggregate);
            }
            None => {
                entries.remove(site);
            }
        }
        true
    }

    /// Drop the entry of a Site that no longer exists
    pub fn remove(&self, site: &ObjectKey) {
        self.lock().remove(site);
    }

    /// Aggregate comparison rule
    ///
    /// Both absent: equal. Exactly one absent: different. Otherwise different when
    /// sizes differ, a key is missing on the other side, or the bytes under a key differ.
    pub fn differs(current: Option<&Aggregate>, desired: Option<&Aggregate>) -> bool {
        match (current, desired) {
            (None, None) => false,
            (Some(_), None) | (None, Some(_)) => true,
            (Some(current), Some(desired)) => {
                current.len() != desired.len()
                    || current
                        .iter()
                        .any(|(key, value)| desired.get(key) != Some(value))
            }
        }
    }

    // Entries stay usable after a panic elsewhere; every write is a single insert/remove
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, Aggregate>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PageDataProvider for AggregateCache {
    fn get_data(&self, site: &ObjectKey) -> Option<Aggregate> {
        self.get(site)
    }

    fn forget(&self, site: &ObjectKey) {
        self.remove(site);
    }
}
