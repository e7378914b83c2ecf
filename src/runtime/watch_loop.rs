//! # Watch Loop
//!
//! Runs the Site and Page controllers until shutdown.
//!
//! The Site controller also watches the children it owns, so a drifted or deleted
//! Deployment, ConfigMap, Service or Ingress brings its Site back. The Page controller
//! runs off a reflector whose store doubles as the Page index of the cluster client,
//! and re-runs the Pages of a Site whenever that Site changes, so a recreated Site
//! gets its aggregate back. SIGTERM or ctrl-c
//! cancels the shared token: both controllers stop taking work and in-flight
//! reconciles abort with [`Error::Cancelled`].

use crate::constants::{CONTROLLER_NAME, LABEL_PART_OF};
use crate::controller::client::pages_for_site;
use crate::controller::{ClusterClient, KubeClusterClient, ObjectKey};
use crate::crd::{Page, Site};
use crate::error::{Error, Result};
use crate::runtime::context::ControllerContext;
use crate::runtime::error_policy::{backoff_key, page_error_policy, site_error_policy};
use anyhow::Context as _;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::{self, Action, Controller};
use kube_runtime::reflector::store::Writer;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, WatchStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconcile entry point of the Site controller
pub async fn reconcile_site<C: ClusterClient>(
    site: Arc<Site>,
    ctx: Arc<ControllerContext<C>>,
) -> Result<Action> {
    let key = ObjectKey::from_resource(site.as_ref(), "Site")?;
    let action = ctx.sites.reconcile(&key, &ctx.cancel).await?;
    ctx.backoff.reset(&backoff_key("site", site.as_ref()));
    Ok(action)
}

/// Reconcile entry point of the Page controller
pub async fn reconcile_page<C: ClusterClient>(
    page: Arc<Page>,
    ctx: Arc<ControllerContext<C>>,
) -> Result<Action> {
    let key = ObjectKey::from_resource(page.as_ref(), "Page")?;
    let action = ctx.pages.reconcile(&key, &ctx.cancel).await?;
    ctx.backoff.reset(&backoff_key("page", page.as_ref()));
    Ok(action)
}

/// Run both controllers until a shutdown signal arrives
///
/// # Errors
///
/// Fails when the Site or Page CRD is not installed.
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<ControllerContext<KubeClusterClient>>,
    page_index: Writer<Page>,
) -> anyhow::Result<()> {
    let sites: Api<Site> = Api::all(client.clone());
    let pages: Api<Page> = Api::all(client.clone());

    // Fail fast with a clear message instead of a silently retrying watch
    sites
        .list(&kube::api::ListParams::default().limit(1))
        .await
        .context("Site CRD is not queryable; is it installed?")?;
    pages
        .list(&kube::api::ListParams::default().limit(1))
        .await
        .context("Page CRD is not queryable; is it installed?")?;

    tokio::spawn(shutdown_signal(ctx.cancel.clone()));

    let owned = watcher::Config::default().labels(&format!("{LABEL_PART_OF}={CONTROLLER_NAME}"));

    let site_controller = Controller::new(sites, watcher::Config::default())
        .owns(Api::<Deployment>::all(client.clone()), owned.clone())
        .owns(Api::<ConfigMap>::all(client.clone()), owned.clone())
        .owns(Api::<Service>::all(client.clone()), owned.clone())
        .owns(Api::<Ingress>::all(client.clone()), owned)
        .graceful_shutdown_on(cancelled(ctx.cancel.clone()))
        .run(
            reconcile_site::<KubeClusterClient>,
            site_error_policy::<KubeClusterClient>,
            Arc::clone(&ctx),
        )
        .for_each(|result| async move { log_result("Site", result) });

    let page_store = page_index.as_reader();
    let page_events = watcher(pages, watcher::Config::default())
        .default_backoff()
        .reflect(page_index)
        .touched_objects();
    let page_controller = Controller::for_stream(page_events, page_store.clone())
        .watches(
            Api::<Site>::all(client.clone()),
            watcher::Config::default(),
            move |site| pages_of_site(&page_store, &site),
        )
        .graceful_shutdown_on(cancelled(ctx.cancel.clone()))
        .run(
            reconcile_page::<KubeClusterClient>,
            page_error_policy::<KubeClusterClient>,
            Arc::clone(&ctx),
        )
        .for_each(|result| async move { log_result("Page", result) });

    info!("Watching Site and Page resources");
    futures::join!(site_controller, page_controller);
    info!("Controllers stopped");
    Ok(())
}

/// Pages referencing `site`, for re-running them when the Site changes
fn pages_of_site(store: &Store<Page>, site: &Site) -> Vec<ObjectRef<Page>> {
    let Some(namespace) = site.namespace() else {
        return Vec::new();
    };
    pages_for_site(store, &namespace, &site.name_any())
        .iter()
        .map(ObjectRef::from_obj)
        .collect()
}

fn log_result<K, Q>(
    kind: &str,
    result: std::result::Result<(ObjectRef<K>, Action), controller::Error<Error, Q>>,
) where
    K: Resource,
    Q: std::error::Error + 'static,
{
    match result {
        Ok((obj, _)) => debug!("{} {} reconciled", kind, obj),
        // Already reported by the error policy
        Err(controller::Error::ReconcilerFailed(err, obj)) => {
            debug!("{} {} failed: {}", kind, obj, err);
        }
        Err(err) => warn!("{} controller error: {}", kind, err),
    }
}

async fn cancelled(cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// Wait for SIGTERM or ctrl-c, then fire `cancel`
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received, cancelling in-flight reconciles");
    cancel.cancel();
}

