//! # Error Policy
//!
//! Requeue decisions for failed reconciles.
//!
//! Each resource backs off independently along a Fibonacci sequence between
//! [`MIN_ERROR_BACKOFF_SECS`] and [`MAX_ERROR_BACKOFF_SECS`]; a successful reconcile
//! resets it. Cancelled reconciles are requeued at the minimum delay without counting
//! as an error.

use crate::constants::{MAX_ERROR_BACKOFF_SECS, MIN_ERROR_BACKOFF_SECS};
use crate::crd::{Page, Site};
use crate::error::Error;
use crate::observability::metrics;
use crate::runtime::backoff::FibonacciBackoff;
use crate::runtime::context::ControllerContext;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Error policy of the Site controller
pub fn site_error_policy<C>(site: Arc<Site>, error: &Error, ctx: Arc<ControllerContext<C>>) -> Action {
    handle_reconciliation_error("site", site.as_ref(), error, &ctx)
}

/// Error policy of the Page controller
pub fn page_error_policy<C>(page: Arc<Page>, error: &Error, ctx: Arc<ControllerContext<C>>) -> Action {
    handle_reconciliation_error("page", page.as_ref(), error, &ctx)
}

/// Key under which a resource's consecutive errors are tracked
pub fn backoff_key<K: ResourceExt>(controller: &str, obj: &K) -> String {
    format!(
        "{}:{}/{}",
        controller,
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

fn handle_reconciliation_error<K: ResourceExt, C>(
    controller: &str,
    obj: &K,
    error: &Error,
    ctx: &ControllerContext<C>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = controller,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    if error.is_cancelled() {
        info!("Reconcile of {} {}/{} cancelled, requeueing", controller, namespace, name);
        metrics::increment_requeues_total("cancelled");
        return Action::requeue(Duration::from_secs(MIN_ERROR_BACKOFF_SECS));
    }

    error!(
        "Reconciliation error for {} {}/{}: {}",
        controller, namespace, name, error
    );

    let error_count = ctx.backoff.record_error(&backoff_key(controller, obj));
    let delay = FibonacciBackoff::calculate_for_error_count(
        error_count.saturating_sub(1),
        MIN_ERROR_BACKOFF_SECS,
        MAX_ERROR_BACKOFF_SECS,
    );
    info!(
        "Retrying {} {}/{} in {}s (error count: {}, reason: {})",
        controller,
        namespace,
        name,
        delay.as_secs(),
        error_count,
        error.metric_label()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
