//! # Site Reconciler
//!
//! Converges the five children of a Site and reports the outcome through the Site's
//! `Available` condition.
//!
//! ## Flow
//!
//! 1. Fetch the Site; absent means deleted, children go with it through their owner
//!    references and its cached page aggregate is dropped.
//! 2. First pass only: `Available=Unknown` ("Starting reconciliation").
//! 3. Ensure each child in [`Step::ORDER`]. A child is created when absent and
//!    otherwise checked against its drift policy.
//! 4. First failing step aborts the pass and sets `Available=False`.
//! 5. Full success sets `Available=True` and clears a pending `UpToDate=False`.
//!
//! Every pass starts from freshly fetched state, so redelivery is always safe.

mod config_maps;
mod ingress;
mod service;
mod workload;

use super::cache::PageDataProvider;
use super::client::{cancellable, ClusterClient, NamespacedObject};
use super::conditions::{find_condition, set_condition};
use super::ownership::{data_config_name, static_config_name, workload_name};
use super::ObjectKey;
use crate::config::ControllerConfig;
use crate::constants::{
    CONDITION_AVAILABLE, CONDITION_UP_TO_DATE, REASON_FAILED, REASON_FINISHED, REASON_STARTING,
};
use crate::crd::{Condition, ConditionStatus, Site, SiteStatus};
use crate::error::{Error, Result, Step};
use crate::observability::metrics;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

const CONTROLLER: &str = "site";

/// Result of comparing an existing child with its desired shape
pub(crate) enum Drift<K> {
    /// Matches, or the child is never diffed
    InSync,
    /// Differs; carries the existing object with the desired fields applied
    Update(K),
    /// Shape the controller never produces; the child is deleted and the pass fails
    Corrupt(Error),
}

/// What an ensure step did to its child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildOutcome {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for ChildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChildOutcome::Created => "created",
            ChildOutcome::Updated => "updated",
            ChildOutcome::Unchanged => "unchanged",
        })
    }
}

/// Reconciler for Site resources
pub struct SiteReconciler<C> {
    client: Arc<C>,
    config: Arc<ControllerConfig>,
    pages: Arc<dyn PageDataProvider>,
}

impl<C> std::fmt::Debug for SiteReconciler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteReconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: ClusterClient> SiteReconciler<C> {
    pub fn new(
        client: Arc<C>,
        config: Arc<ControllerConfig>,
        pages: Arc<dyn PageDataProvider>,
    ) -> Self {
        Self {
            client,
            config,
            pages,
        }
    }

    /// Run one reconcile pass for the Site identified by `key`
    ///
    /// # Errors
    ///
    /// Returns the first failing step wrapped in [`Error::Step`], a failure of the
    /// initial status write, or [`Error::Cancelled`] when `cancel` fires.
    pub async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<Action> {
        let span = tracing::info_span!(
            "site.reconcile",
            resource.kind = "Site",
            resource.namespace = %key.namespace,
            resource.name = %key.name,
        );

        let start = Instant::now();
        metrics::increment_reconciliations(CONTROLLER);
        let result = self.reconcile_site(key, cancel).instrument(span).await;
        metrics::observe_reconciliation_duration(CONTROLLER, start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors(CONTROLLER);
        }

        result.map(|()| Action::await_change())
    }

    async fn reconcile_site(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<()> {
        let Some(mut site) =
            cancellable(cancel, self.client.get::<Site>(&key.namespace, &key.name)).await?
        else {
            info!("Site {} not found, ignoring since it must have been deleted", key);
            self.pages.forget(key);
            return Ok(());
        };

        if site.conditions().is_empty() {
            site = self
                .write_conditions(site, key, cancel, |conditions| {
                    set_condition(
                        conditions,
                        CONDITION_AVAILABLE,
                        ConditionStatus::Unknown,
                        REASON_STARTING,
                        "Reconciliation started",
                    )
                })
                .await?;
        }

        let mut touched = Vec::new();
        for step in Step::ORDER {
            match self.run_step(step, &site, key, cancel).await {
                Ok(ChildOutcome::Unchanged) => {}
                Ok(outcome) => touched.push(format!("{step} {outcome}")),
                Err(err) => {
                    return Err(self.fail_with_status(site, key, cancel, err.in_step(step)).await);
                }
            }
        }

        self.write_conditions(site, key, cancel, |conditions| {
            let mut changed = set_condition(
                conditions,
                CONDITION_AVAILABLE,
                ConditionStatus::True,
                REASON_FINISHED,
                "All child resources are up to date",
            );
            let stale = find_condition(conditions, CONDITION_UP_TO_DATE)
                .is_some_and(|c| c.status == ConditionStatus::False);
            if stale {
                changed |= set_condition(
                    conditions,
                    CONDITION_UP_TO_DATE,
                    ConditionStatus::True,
                    REASON_FINISHED,
                    "Page content rendered",
                );
            }
            changed
        })
        .await?;

        if touched.is_empty() {
            debug!("Site {} reconciled, all children up to date", key);
        } else {
            info!("Site {} reconciled: {}", key, touched.join(", "));
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: Step,
        site: &Site,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ChildOutcome> {
        match step {
            Step::Workload => {
                self.ensure_child(
                    step,
                    key,
                    workload_name(&key.name),
                    cancel,
                    || workload::desired(site),
                    |existing: Deployment| workload::drift(site, existing),
                )
                .await
            }
            Step::StaticConfig => {
                self.ensure_child(
                    step,
                    key,
                    static_config_name(&key.name),
                    cancel,
                    || config_maps::desired_static(site),
                    |_: ConfigMap| Drift::InSync,
                )
                .await
            }
            Step::DataConfig => {
                let aggregate = self.pages.get_data(key);
                self.ensure_child(
                    step,
                    key,
                    data_config_name(&key.name),
                    cancel,
                    || config_maps::desired_data(site, aggregate.as_ref()),
                    |existing: ConfigMap| {
                        config_maps::data_drift(self.pages.as_ref(), existing, aggregate.as_ref())
                    },
                )
                .await
            }
            Step::NetworkEndpoint => {
                self.ensure_child(
                    step,
                    key,
                    workload_name(&key.name),
                    cancel,
                    || service::desired(site),
                    |_: Service| Drift::InSync,
                )
                .await
            }
            Step::ExternalRoute => {
                self.ensure_child(
                    step,
                    key,
                    workload_name(&key.name),
                    cancel,
                    || ingress::desired(site, &self.config),
                    |_: Ingress| Drift::InSync,
                )
                .await
            }
        }
    }

    /// Fetch a child by name; create it when absent, otherwise apply `drift`
    async fn ensure_child<K, B, D>(
        &self,
        step: Step,
        key: &ObjectKey,
        name: String,
        cancel: &CancellationToken,
        build: B,
        drift: D,
    ) -> Result<ChildOutcome>
    where
        K: NamespacedObject,
        B: FnOnce() -> Result<K>,
        D: FnOnce(K) -> Drift<K>,
    {
        let namespace = key.namespace.as_str();
        debug!("Checking {} {}/{}", step, namespace, name);

        let Some(existing) = cancellable(cancel, self.client.get::<K>(namespace, &name)).await?
        else {
            let desired = build()?;
            cancellable(cancel, self.client.create(namespace, &desired)).await?;
            info!("Created {} {}/{}", step, namespace, name);
            metrics::increment_children_created(step.as_str());
            return Ok(ChildOutcome::Created);
        };

        match drift(existing) {
            Drift::InSync => {
                debug!("{} {}/{} is ok", step, namespace, name);
                Ok(ChildOutcome::Unchanged)
            }
            Drift::Update(updated) => {
                cancellable(cancel, self.client.replace(namespace, &updated)).await?;
                info!("Updated {} {}/{}", step, namespace, name);
                metrics::increment_children_updated(step.as_str());
                Ok(ChildOutcome::Updated)
            }
            Drift::Corrupt(err) => {
                warn!("Deleting {} {}/{}: {}", step, namespace, name, err);
                if let Err(delete_err) =
                    cancellable(cancel, self.client.delete::<K>(namespace, &name)).await
                {
                    if delete_err.is_cancelled() {
                        return Err(delete_err);
                    }
                    error!(
                        "Failed to delete {} {}/{}: {}",
                        step, namespace, name, delete_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Report `err` as `Available=False`; the original error is always returned
    async fn fail_with_status(
        &self,
        site: Site,
        key: &ObjectKey,
        cancel: &CancellationToken,
        err: Error,
    ) -> Error {
        if err.is_cancelled() {
            debug!("Site {} reconcile cancelled", key);
            return err;
        }

        error!("Site {} reconcile failed: {}", key, err);
        let message = err.to_string();
        let written = self
            .write_conditions(site, key, cancel, |conditions| {
                set_condition(
                    conditions,
                    CONDITION_AVAILABLE,
                    ConditionStatus::False,
                    REASON_FAILED,
                    &message,
                )
            })
            .await;
        if let Err(status_err) = written {
            warn!(
                "Failed to record failure on Site {} status: {}",
                key, status_err
            );
        }
        err
    }

    /// Apply `update` to the Site's conditions and persist them when changed
    ///
    /// Returns the object as stored by the cluster so later writes carry a fresh
    /// resourceVersion.
    async fn write_conditions<F>(
        &self,
        mut site: Site,
        key: &ObjectKey,
        cancel: &CancellationToken,
        update: F,
    ) -> Result<Site>
    where
        F: FnOnce(&mut Vec<Condition>) -> bool,
    {
        let status = site.status.get_or_insert_with(SiteStatus::default);
        if !update(&mut status.conditions) {
            return Ok(site);
        }
        debug!(
            "Writing status of Site {} (resourceVersion {:?})",
            key,
            site.resource_version()
        );
        cancellable(cancel, self.client.update_status(&key.namespace, &site)).await
    }
}
