//! # Controller Context
//!
//! State shared by every reconcile call the watch loop delivers.

use crate::controller::{PageReconciler, SiteReconciler};
use crate::runtime::backoff::BackoffTracker;
use tokio_util::sync::CancellationToken;

/// Context handed to the Site and Page controllers
#[derive(Debug)]
pub struct ControllerContext<C> {
    pub sites: SiteReconciler<C>,
    pub pages: PageReconciler<C>,
    /// Fired on shutdown; aborts in-flight reconciles
    pub cancel: CancellationToken,
    pub backoff: BackoffTracker,
}

impl<C> ControllerContext<C> {
    pub fn new(sites: SiteReconciler<C>, pages: PageReconciler<C>, cancel: CancellationToken) -> Self {
        Self {
            sites,
            pages,
            cancel,
            backoff: BackoffTracker::new(),
        }
    }
}
