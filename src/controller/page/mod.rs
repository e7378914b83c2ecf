//! # Page Reconciler
//!
//! Keeps the aggregate of every Site in sync with its Pages and signals the Site when
//! that aggregate changes.
//!
//! ## Flow
//!
//! - **Active** Page: ensure the finalizer, resolve the Site, recompute the aggregate.
//! - **Finalizing** Page: recompute the aggregate without it (phase 1), then release
//!   the finalizer (phase 2). When the Site is already gone its cache entry is dropped
//!   instead.
//! - **Released** Page: nothing left to do.
//!
//! A changed aggregate is stored in the [`AggregateCache`], its digest is written to
//! the Site's hash annotation and `UpToDate=False` is set. Those writes are what make
//! the Site controller pick up content changes, since Page edits never touch the Site
//! spec. The Site write always carries the fetched resourceVersion, so a reconcile
//! working from an outdated listing fails with a conflict and is retried.

pub mod aggregate;
pub mod finalizer;

pub use aggregate::{aggregate_digest, build_aggregate};
pub use finalizer::PageLifecycle;

use super::cache::AggregateCache;
use super::client::{cancellable, ClusterClient};
use super::conditions::set_condition;
use super::ObjectKey;
use crate::constants::{CONDITION_UP_TO_DATE, PAGES_HASH_ANNOTATION, REASON_PAGE_CHANGED};
use crate::crd::{ConditionStatus, Page, Site, SiteStatus};
use crate::error::{Error, Result};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

const CONTROLLER: &str = "page";

/// Reconciler for Page resources
pub struct PageReconciler<C> {
    client: Arc<C>,
    cache: Arc<AggregateCache>,
}

impl<C> std::fmt::Debug for PageReconciler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReconciler")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<C: ClusterClient> PageReconciler<C> {
    pub fn new(client: Arc<C>, cache: Arc<AggregateCache>) -> Self {
        Self { client, cache }
    }

    /// Run one reconcile pass for the Page identified by `key`
    ///
    /// # Errors
    ///
    /// [`Error::SiteNotFound`] when an active Page references a missing Site, any
    /// failed cluster call, or [`Error::Cancelled`] when `cancel` fires.
    pub async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<Action> {
        let span = tracing::info_span!(
            "page.reconcile",
            resource.kind = "Page",
            resource.namespace = %key.namespace,
            resource.name = %key.name,
        );

        let start = Instant::now();
        metrics::increment_reconciliations(CONTROLLER);
        let result = self.reconcile_page(key, cancel).instrument(span).await;
        metrics::observe_reconciliation_duration(CONTROLLER, start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors(CONTROLLER);
        }

        result.map(|()| Action::await_change())
    }

    async fn reconcile_page(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<()> {
        let Some(page) =
            cancellable(cancel, self.client.get::<Page>(&key.namespace, &key.name)).await?
        else {
            info!("Page {} not found, ignoring since it must have been deleted", key);
            return Ok(());
        };
        let site_key = ObjectKey::new(key.namespace.clone(), page.spec.site.clone());

        match PageLifecycle::of(&page) {
            PageLifecycle::Active => {
                self.ensure_finalizer(&page, key, cancel).await?;
                let site = self.fetch_site(&site_key, cancel).await?.ok_or_else(|| {
                    Error::SiteNotFound {
                        namespace: site_key.namespace.clone(),
                        name: site_key.name.clone(),
                    }
                })?;
                self.refresh_aggregate(&site_key, site, cancel).await
            }
            PageLifecycle::Finalizing => {
                match self.fetch_site(&site_key, cancel).await? {
                    Some(site) => self.refresh_aggregate(&site_key, site, cancel).await?,
                    None => {
                        warn!(
                            "Site {} of deleted Page {} no longer exists, releasing the page anyway",
                            site_key, key
                        );
                        self.cache.remove(&site_key);
                    }
                }
                self.release(&page, key, cancel).await
            }
            PageLifecycle::Released => {
                debug!("Page {} already released, waiting for removal", key);
                Ok(())
            }
        }
    }

    async fn fetch_site(
        &self,
        site_key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Option<Site>> {
        cancellable(
            cancel,
            self.client.get::<Site>(&site_key.namespace, &site_key.name),
        )
        .await
    }

    async fn ensure_finalizer(
        &self,
        page: &Page,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(updated) = finalizer::with_finalizer(page) else {
            return Ok(());
        };
        cancellable(cancel, self.client.replace(&key.namespace, &updated)).await?;
        info!("Added finalizer to Page {}", key);
        Ok(())
    }

    async fn release(&self, page: &Page, key: &ObjectKey, cancel: &CancellationToken) -> Result<()> {
        let Some(updated) = finalizer::without_finalizer(page) else {
            return Ok(());
        };
        cancellable(cancel, self.client.replace(&key.namespace, &updated)).await?;
        info!("Removed finalizer from Page {}", key);
        Ok(())
    }

    /// Recompute the aggregate of `site_key` from a fresh listing
    ///
    /// A changed aggregate is swapped into the cache only if no other reconcile wrote
    /// the entry meanwhile, then the Site is signalled. A failed signal swaps the
    /// previous entry back so the next delivery sees the change again.
    async fn refresh_aggregate(
        &self,
        site_key: &ObjectKey,
        site: Site,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let previous = self.cache.get(site_key);
        let pages = cancellable(
            cancel,
            self.client
                .list_pages_for_site(&site_key.namespace, &site_key.name),
        )
        .await?;
        let aggregate = build_aggregate(site_key, &pages);

        if !AggregateCache::differs(previous.as_ref(), Some(&aggregate)) {
            debug!("Aggregate of site {} unchanged", site_key);
            return Ok(());
        }

        let digest = aggregate_digest(&aggregate);
        if !self
            .cache
            .compare_and_set(site_key, previous.as_ref(), Some(aggregate.clone()))
        {
            return Err(Error::Conflict {
                kind: "Site".to_string(),
                name: site_key.name.clone(),
                message: "page aggregate was updated concurrently".to_string(),
            });
        }
        info!(
            "Aggregate of site {} changed: {} page(s), digest {}",
            site_key,
            aggregate.len(),
            digest
        );
        metrics::increment_aggregate_changes();

        if let Err(err) = self.signal_site(site, site_key, &digest, cancel).await {
            self.cache.compare_and_set(site_key, Some(&aggregate), previous);
            return Err(err);
        }
        Ok(())
    }

    /// Stamp `digest` on the Site and mark it `UpToDate=False`
    ///
    /// The Site is always written back as fetched: its resourceVersion makes a stale
    /// snapshot fail with a conflict instead of signalling an outdated aggregate.
    async fn signal_site(
        &self,
        mut site: Site,
        site_key: &ObjectKey,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        site.annotations_mut()
            .insert(PAGES_HASH_ANNOTATION.to_string(), digest.to_string());
        site = cancellable(cancel, self.client.replace(&site_key.namespace, &site)).await?;

        let status = site.status.get_or_insert_with(SiteStatus::default);
        if set_condition(
            &mut status.conditions,
            CONDITION_UP_TO_DATE,
            ConditionStatus::False,
            REASON_PAGE_CHANGED,
            "Page content changed",
        ) {
            cancellable(cancel, self.client.update_status(&site_key.namespace, &site)).await?;
        }

        debug!("Signalled site {} with digest {}", site_key, digest);
        Ok(())
    }
}
