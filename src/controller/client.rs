//! # Cluster Client
//!
//! The seam between the reconcilers and the Kubernetes API.
//!
//! Reconcilers only ever talk to [`ClusterClient`], so tests can substitute an
//! in-memory cluster while production uses [`KubeClusterClient`]. Every call a
//! reconciler issues is wrapped in [`cancellable`].

use crate::constants::CONTROLLER_NAME;
use crate::crd::Page;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use kube_runtime::reflector::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Namespaced resource the controller can read and write
pub trait NamespacedObject:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedObject for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Cluster operations used by the reconcilers
///
/// Writes that carry a `resourceVersion` are optimistic: a stale version yields
/// [`Error::Conflict`].
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch an object; not-found is `Ok(None)`
    async fn get<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create an object; already-exists is a conflict
    async fn create<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace metadata and spec of an existing object
    async fn replace<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Write the status subresource of an existing object
    async fn update_status<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Delete an object; not-found counts as success
    async fn delete<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<()>;

    /// Pages in `namespace` whose `spec.site` equals `site`
    async fn list_pages_for_site(&self, namespace: &str, site: &str) -> Result<Vec<Page>>;
}

/// Run one cluster call, aborting with [`Error::Cancelled`] once `cancel` fires
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result,
    }
}

/// [`ClusterClient`] backed by the Kubernetes API server
///
/// Page lookups are served from the reflector store the Page controller keeps
/// warm, so aggregating a Site costs no API round trip.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    pages: Store<Page>,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    pub fn new(client: Client, pages: Store<Page>) -> Self {
        Self { client, pages }
    }

    fn api<K: NamespacedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map 409 responses to [`Error::Conflict`], everything else to [`Error::Kube`]
fn classify<K: NamespacedObject>(err: kube::Error, name: &str) -> Error {
    match err {
        kube::Error::Api(ref response) if response.code == 409 => Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: name.to_string(),
            message: response.message.clone(),
        },
        other => Error::Kube(other),
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let name = obj.name_any();
        self.api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name))
    }

    async fn replace<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let name = obj.name_any();
        self.api::<K>(namespace)
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name))
    }

    async fn update_status<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let value = serde_json::to_value(obj)?;
        // Carrying resourceVersion makes the merge patch fail with 409 on a stale object
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": value.get("status").cloned().unwrap_or(serde_json::Value::Null),
        });
        self.api::<K>(namespace)
            .patch_status(
                &name,
                &PatchParams::apply(CONTROLLER_NAME),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| classify::<K>(e, &name))
    }

    async fn delete<K: NamespacedObject>(&self, namespace: &str, name: &str) -> Result<()> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("{} {}/{} already gone", K::kind(&()), namespace, name);
                Ok(())
            }
            Err(e) => Err(classify::<K>(e, name)),
        }
    }

    async fn list_pages_for_site(&self, namespace: &str, site: &str) -> Result<Vec<Page>> {
        // A partially synced store would yield an aggregate missing pages
        self.pages
            .wait_until_ready()
            .await
            .map_err(Error::PageIndexUnavailable)?;
        Ok(pages_for_site(&self.pages, namespace, site))
    }
}

/// Pages in `namespace` whose `spec.site` is `site`, ordered by object name
pub fn pages_for_site(store: &Store<Page>, namespace: &str, site: &str) -> Vec<Page> {
    let mut pages: Vec<Page> = store
        .state()
        .into_iter()
        .filter(|page| page.namespace().as_deref() == Some(namespace) && page.spec.site == site)
        .map(|page| page.as_ref().clone())
        .collect();
    pages.sort_by_key(ResourceExt::name_any);
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_runtime::watcher;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancellable_returns_cancelled_when_token_already_fired() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, async { Ok::<_, Error>(7) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(())
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    fn page(namespace: &str, name: &str, site: &str) -> Page {
        let mut page = Page::new(
            name,
            crate::crd::PageSpec {
                name: name.to_string(),
                content: String::new(),
                site: site.to_string(),
            },
        );
        page.metadata.namespace = Some(namespace.to_string());
        page
    }

    #[tokio::test]
    async fn test_pages_for_site_reads_synced_store() {
        let (store, mut writer) = kube_runtime::reflector::store::<Page>();
        writer.apply_watcher_event(&watcher::Event::Init);
        for page in [
            page("web", "p2", "s1"),
            page("web", "p1", "s1"),
            page("web", "p3", "s2"),
            page("other", "p4", "s1"),
        ] {
            writer.apply_watcher_event(&watcher::Event::InitApply(page));
        }
        writer.apply_watcher_event(&watcher::Event::InitDone);
        store.wait_until_ready().await.unwrap();

        let names: Vec<_> = pages_for_site(&store, "web", "s1")
            .iter()
            .map(ResourceExt::name_any)
            .collect();
        assert_eq!(names, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_pages_for_site_drops_deleted_pages() {
        let (store, mut writer) = kube_runtime::reflector::store::<Page>();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(page("web", "p1", "s1")));
        writer.apply_watcher_event(&watcher::Event::InitDone);
        writer.apply_watcher_event(&watcher::Event::Delete(page("web", "p1", "s1")));

        assert!(pages_for_site(&store, "web", "s1").is_empty());
    }
}
