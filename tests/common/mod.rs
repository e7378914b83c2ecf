//! In-memory cluster for reconciler tests
//!
//! Objects are stored as JSON keyed by (kind, namespace, name). The fake models the
//! API server behaviour the reconcilers depend on:
//! - `resourceVersion` checks on replace and status writes (stale -> conflict)
//! - the status subresource (replace keeps status, status writes touch only status)
//! - finalizer-gated deletion (delete marks, releasing the last finalizer removes)
//! - one-shot failure injection per operation and kind

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube_runtime::controller::Action;
use serde_json::{json, Value};
use site_page_controller::config::ControllerConfig;
use site_page_controller::controller::{
    AggregateCache, ClusterClient, NamespacedObject, ObjectKey, PageDataProvider, PageReconciler,
    SiteReconciler,
};
use site_page_controller::{Condition, Error, Page, PageSpec, Result, Site, SiteSpec};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub const NS: &str = "web";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    Create,
    Replace,
    UpdateStatus,
    Delete,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub kind: String,
    pub name: String,
}

type Key = (String, String, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    revision: u64,
    calls: Vec<Call>,
    failures: Vec<(Op, String)>,
}

impl State {
    fn record(&mut self, op: Op, kind: &str, name: &str) -> Result<()> {
        self.calls.push(Call {
            op,
            kind: kind.to_string(),
            name: name.to_string(),
        });
        if let Some(index) = self
            .failures
            .iter()
            .position(|(o, k)| *o == op && k == kind)
        {
            self.failures.remove(index);
            return Err(conflict(kind, name, "injected failure"));
        }
        Ok(())
    }

    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

fn conflict(kind: &str, name: &str, message: &str) -> Error {
    Error::Conflict {
        kind: kind.to_string(),
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn kind_of<K: NamespacedObject>() -> String {
    K::kind(&()).to_string()
}

fn name_of(value: &Value) -> String {
    value["metadata"]["name"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

fn is_deleting(value: &Value) -> bool {
    !value["metadata"]["deletionTimestamp"].is_null()
}

fn check_revision(kind: &str, name: &str, stored: &Value, incoming: &Value) -> Result<()> {
    match incoming["metadata"]["resourceVersion"].as_str() {
        Some(rv) if Some(rv) != stored["metadata"]["resourceVersion"].as_str() => {
            Err(conflict(kind, name, "stale resourceVersion"))
        }
        _ => Ok(()),
    }
}

/// In-memory [`ClusterClient`]
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Seed an object as a user would create it, status included
    pub fn insert<K: NamespacedObject>(&self, obj: K) -> K {
        let mut value = serde_json::to_value(&obj).unwrap();
        let namespace = value["metadata"]["namespace"]
            .as_str()
            .unwrap_or(NS)
            .to_string();
        let mut state = self.lock();
        let revision = state.next_revision();
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = json!(format!("uid-{revision}"));
        }
        value["metadata"]["namespace"] = json!(namespace);
        value["metadata"]["resourceVersion"] = json!(revision);
        state
            .objects
            .insert((kind_of::<K>(), namespace, name_of(&value)), value.clone());
        serde_json::from_value(value).unwrap()
    }

    /// Current stored object, bypassing the call log
    pub fn object<K: NamespacedObject>(&self, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&(kind_of::<K>(), NS.to_string(), name.to_string()))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    /// Edit a stored object out of band, as a user or another controller would
    pub fn modify<K: NamespacedObject>(&self, name: &str, edit: impl FnOnce(&mut K)) {
        let mut state = self.lock();
        let key = (kind_of::<K>(), NS.to_string(), name.to_string());
        let mut obj: K = serde_json::from_value(state.objects[&key].clone()).unwrap();
        edit(&mut obj);
        let mut value = serde_json::to_value(&obj).unwrap();
        value["metadata"]["resourceVersion"] = json!(state.next_revision());
        state.objects.insert(key, value);
    }

    /// Delete an object out of band, honouring finalizers
    pub fn user_delete<K: NamespacedObject>(&self, name: &str) {
        let mut state = self.lock();
        let key = (kind_of::<K>(), NS.to_string(), name.to_string());
        Self::delete_locked(&mut state, &key);
    }

    fn delete_locked(state: &mut State, key: &Key) {
        let Some(stored) = state.objects.get(key).cloned() else {
            return;
        };
        if has_finalizers(&stored) {
            let mut stored = stored;
            if !is_deleting(&stored) {
                stored["metadata"]["deletionTimestamp"] = json!("2024-01-01T00:00:00Z");
            }
            stored["metadata"]["resourceVersion"] = json!(state.next_revision());
            state.objects.insert(key.clone(), stored);
        } else {
            state.objects.remove(key);
        }
    }

    /// Make the next `op` on `kind` fail with a conflict
    pub fn fail_next(&self, op: Op, kind: &str) {
        self.lock().failures.push((op, kind.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded `op` calls on `kind`
    pub fn count(&self, op: Op, kind: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.kind == kind)
            .count()
    }

    /// Recorded calls that change cluster state
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c.op, Op::Get | Op::List))
            .collect()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let kind = kind_of::<K>();
        let mut state = self.lock();
        state.record(Op::Get, &kind, name)?;
        state
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .map(|v| serde_json::from_value(v.clone()).map_err(Error::from))
            .transpose()
    }

    async fn create<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = kind_of::<K>();
        let mut value = serde_json::to_value(obj)?;
        let name = name_of(&value);
        let mut state = self.lock();
        state.record(Op::Create, &kind, &name)?;

        let key = (kind.clone(), namespace.to_string(), name.clone());
        if state.objects.contains_key(&key) {
            return Err(conflict(&kind, &name, "already exists"));
        }
        if let Some(fields) = value.as_object_mut() {
            fields.remove("status");
        }
        let revision = state.next_revision();
        value["metadata"]["uid"] = json!(format!("uid-{revision}"));
        value["metadata"]["namespace"] = json!(namespace);
        value["metadata"]["resourceVersion"] = json!(revision);
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = kind_of::<K>();
        let mut value = serde_json::to_value(obj)?;
        let name = name_of(&value);
        let mut state = self.lock();
        state.record(Op::Replace, &kind, &name)?;

        let key = (kind.clone(), namespace.to_string(), name.clone());
        let Some(stored) = state.objects.get(&key).cloned() else {
            return Err(conflict(&kind, &name, "not found"));
        };
        check_revision(&kind, &name, &stored, &value)?;

        match (value.as_object_mut(), stored.get("status")) {
            (Some(fields), Some(status)) => {
                fields.insert("status".to_string(), status.clone());
            }
            (Some(fields), None) => {
                fields.remove("status");
            }
            _ => {}
        }
        value["metadata"]["uid"] = stored["metadata"]["uid"].clone();
        value["metadata"]["deletionTimestamp"] = stored["metadata"]["deletionTimestamp"].clone();
        value["metadata"]["resourceVersion"] = json!(state.next_revision());

        if is_deleting(&value) && !has_finalizers(&value) {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, value.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = kind_of::<K>();
        let value = serde_json::to_value(obj)?;
        let name = name_of(&value);
        let mut state = self.lock();
        state.record(Op::UpdateStatus, &kind, &name)?;

        let key = (kind.clone(), namespace.to_string(), name.clone());
        let Some(mut stored) = state.objects.get(&key).cloned() else {
            return Err(conflict(&kind, &name, "not found"));
        };
        check_revision(&kind, &name, &stored, &value)?;

        stored["status"] = value["status"].clone();
        stored["metadata"]["resourceVersion"] = json!(state.next_revision());
        state.objects.insert(key, stored.clone());
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<()> {
        let kind = kind_of::<K>();
        let mut state = self.lock();
        state.record(Op::Delete, &kind, name)?;
        Self::delete_locked(&mut state, &(kind, namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn list_pages_for_site(&self, namespace: &str, site: &str) -> Result<Vec<Page>> {
        let mut state = self.lock();
        state.record(Op::List, "Page", site)?;
        state
            .objects
            .iter()
            .filter(|((kind, ns, _), value)| {
                kind == "Page" && ns == namespace && value["spec"]["site"].as_str() == Some(site)
            })
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(Error::from))
            .collect()
    }
}

pub fn site(name: &str, image: &str, replica_count: i32) -> Site {
    let mut site = Site::new(
        name,
        SiteSpec {
            image: image.to_string(),
            replica_count,
        },
    );
    site.metadata.namespace = Some(NS.to_string());
    site
}

pub fn page(name: &str, display_name: &str, content: &str, site: &str) -> Page {
    let mut page = Page::new(
        name,
        PageSpec {
            name: display_name.to_string(),
            content: content.to_string(),
            site: site.to_string(),
        },
    );
    page.metadata.namespace = Some(NS.to_string());
    page
}

pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        ingress_domain: "pages.example.com".to_string(),
        ingress_class: "nginx".to_string(),
    }
}

/// Entries of a data ConfigMap as UTF-8 strings
pub fn data_entries(config_map: &ConfigMap) -> BTreeMap<String, String> {
    config_map
        .binary_data
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8(v.0).unwrap()))
        .collect()
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NS, name)
}

/// Both reconcilers wired to one fake cluster and one cache
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub cache: Arc<AggregateCache>,
    pub sites: SiteReconciler<FakeCluster>,
    pub pages: PageReconciler<FakeCluster>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        let cluster = Arc::new(FakeCluster::new());
        let cache = Arc::new(AggregateCache::new());
        let sites = SiteReconciler::new(
            Arc::clone(&cluster),
            Arc::new(controller_config()),
            Arc::clone(&cache) as Arc<dyn PageDataProvider>,
        );
        let pages = PageReconciler::new(Arc::clone(&cluster), Arc::clone(&cache));
        Self {
            cluster,
            cache,
            sites,
            pages,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn reconcile_site(&self, name: &str) -> Result<Action> {
        self.sites.reconcile(&key(name), &self.cancel).await
    }

    pub async fn reconcile_page(&self, name: &str) -> Result<Action> {
        self.pages.reconcile(&key(name), &self.cancel).await
    }

    pub fn site(&self, name: &str) -> Site {
        self.cluster.object::<Site>(name).unwrap()
    }

    pub fn condition(&self, site: &str, condition_type: &str) -> Option<Condition> {
        self.site(site)
            .conditions()
            .iter()
            .find(|c| c.r#type == condition_type)
            .cloned()
    }
}
