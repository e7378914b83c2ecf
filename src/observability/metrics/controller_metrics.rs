//! # Controller Metrics
//!
//! Metrics for reconciliations, child resource writes, aggregate changes and requeues.
//!
//! `controller` labels are `site` or `page`; `kind` labels are the ensure step names
//! (`deployment`, `static-configmap`, `data-configmap`, `service`, `ingress`).

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec};
use std::sync::LazyLock;

// Reconciliation metrics
static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "site_page_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "site_page_reconciliation_errors_total",
            "Total number of failed reconciliations",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "site_page_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

// Child resource metrics
static CHILDREN_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "site_page_children_created_total",
            "Total number of Site children created",
        ),
        &["kind"],
    )
    .expect("Failed to create CHILDREN_CREATED_TOTAL metric - this should never happen")
});

static CHILDREN_UPDATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "site_page_children_updated_total",
            "Total number of Site children updated after drift",
        ),
        &["kind"],
    )
    .expect("Failed to create CHILDREN_UPDATED_TOTAL metric - this should never happen")
});

// Page aggregate metrics
static AGGREGATE_CHANGES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "site_page_aggregate_changes_total",
        "Total number of page aggregate changes signalled to Sites",
    )
    .expect("Failed to create AGGREGATE_CHANGES_TOTAL metric - this should never happen")
});

// Requeue metrics
static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "site_page_requeues_total",
            "Total number of reconciliation requeues",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CHILDREN_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHILDREN_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AGGREGATE_CHANGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn increment_children_created(kind: &str) {
    CHILDREN_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_children_updated(kind: &str) {
    CHILDREN_UPDATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_aggregate_changes() {
    AGGREGATE_CHANGES_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
