//! Runtime Tests
//!
//! Error policy backoff and the reconcile entry points the watch loop calls.

mod common;

use common::{site, FakeCluster, Harness, Op};
use kube_runtime::controller::Action;
use site_page_controller::runtime::{
    backoff_key, reconcile_site, site_error_policy, ControllerContext,
};
use site_page_controller::Error;
use std::sync::Arc;
use std::time::Duration;

fn context(h: Harness) -> (Arc<FakeCluster>, Arc<ControllerContext<FakeCluster>>) {
    let cluster = Arc::clone(&h.cluster);
    (
        cluster,
        Arc::new(ControllerContext::new(h.sites, h.pages, h.cancel)),
    )
}

fn failure() -> Error {
    Error::Conflict {
        kind: "Site".to_string(),
        name: "s1".to_string(),
        message: "boom".to_string(),
    }
}

#[test]
fn test_consecutive_errors_back_off() {
    let (_, ctx) = context(Harness::new());
    let s1 = Arc::new(site("s1", "x:1", 1));

    let delays: Vec<_> = (0..4)
        .map(|_| site_error_policy(Arc::clone(&s1), &failure(), Arc::clone(&ctx)))
        .collect();

    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(10)),
            Action::requeue(Duration::from_secs(15)),
        ]
    );
}

#[test]
fn test_backoff_is_tracked_per_resource() {
    let (_, ctx) = context(Harness::new());
    let s1 = Arc::new(site("s1", "x:1", 1));
    let s2 = Arc::new(site("s2", "x:1", 1));

    for _ in 0..3 {
        site_error_policy(Arc::clone(&s1), &failure(), Arc::clone(&ctx));
    }

    assert_eq!(
        site_error_policy(s2, &failure(), Arc::clone(&ctx)),
        Action::requeue(Duration::from_secs(5))
    );
}

#[test]
fn test_cancelled_reconcile_is_not_counted() {
    let (_, ctx) = context(Harness::new());
    let s1 = Arc::new(site("s1", "x:1", 1));

    for _ in 0..3 {
        assert_eq!(
            site_error_policy(Arc::clone(&s1), &Error::Cancelled, Arc::clone(&ctx)),
            Action::requeue(Duration::from_secs(5))
        );
    }
    assert_eq!(ctx.backoff.record_error(&backoff_key("site", s1.as_ref())), 1);
}

#[test]
fn test_backoff_key_format() {
    let s1 = site("s1", "x:1", 1);
    assert_eq!(backoff_key("site", &s1), "site:web/s1");
}

#[tokio::test]
async fn test_successful_reconcile_resets_backoff() {
    let (cluster, ctx) = context(Harness::new());
    let s1 = Arc::new(cluster.insert(site("s1", "x:1", 1)));
    site_error_policy(Arc::clone(&s1), &failure(), Arc::clone(&ctx));
    site_error_policy(Arc::clone(&s1), &failure(), Arc::clone(&ctx));

    let action = reconcile_site(Arc::clone(&s1), Arc::clone(&ctx)).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(
        site_error_policy(s1, &failure(), ctx),
        Action::requeue(Duration::from_secs(5))
    );
    assert_eq!(cluster.count(Op::Create, "Deployment"), 1);
}

#[tokio::test]
async fn test_failed_reconcile_keeps_backoff() {
    let (cluster, ctx) = context(Harness::new());
    let s1 = Arc::new(cluster.insert(site("s1", "x:1", 1)));
    site_error_policy(Arc::clone(&s1), &failure(), Arc::clone(&ctx));
    cluster.fail_next(Op::Create, "Deployment");

    let err = reconcile_site(Arc::clone(&s1), Arc::clone(&ctx))
        .await
        .unwrap_err();

    assert!(!err.is_cancelled());
    assert_eq!(
        site_error_policy(s1, &err, ctx),
        Action::requeue(Duration::from_secs(5))
    );
}

#[tokio::test]
async fn test_object_without_namespace_is_rejected() {
    let (_, ctx) = context(Harness::new());
    let mut s1 = site("s1", "x:1", 1);
    s1.metadata.namespace = None;

    let err = reconcile_site(Arc::new(s1), ctx).await.unwrap_err();

    assert!(matches!(err, Error::MissingField { kind: "Site", .. }));
}
