//! Two-phase deletion of Pages.
//!
//! A live Page carries [`PAGE_FINALIZER`]. Once it is marked for deletion the
//! reconciler first recomputes the aggregate without it, then releases the finalizer
//! so the cluster can remove the object.

use crate::constants::PAGE_FINALIZER;
use crate::crd::Page;
use kube::ResourceExt;

/// Where a Page is in its deletion protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLifecycle {
    /// Not marked for deletion; must carry the finalizer
    Active,
    /// Marked for deletion and still held by the finalizer
    Finalizing,
    /// Marked for deletion with the finalizer already released
    Released,
}

impl PageLifecycle {
    pub fn of(page: &Page) -> Self {
        match (page.is_marked_for_deletion(), has_finalizer(page)) {
            (false, _) => PageLifecycle::Active,
            (true, true) => PageLifecycle::Finalizing,
            (true, false) => PageLifecycle::Released,
        }
    }
}

pub fn has_finalizer(page: &Page) -> bool {
    page.finalizers().iter().any(|f| f == PAGE_FINALIZER)
}

/// Page with the finalizer added, `None` when it is already present
pub fn with_finalizer(page: &Page) -> Option<Page> {
    if has_finalizer(page) {
        return None;
    }
    let mut page = page.clone();
    page.finalizers_mut().push(PAGE_FINALIZER.to_string());
    Some(page)
}

/// Page with the finalizer removed, `None` when it is already gone
pub fn without_finalizer(page: &Page) -> Option<Page> {
    if !has_finalizer(page) {
        return None;
    }
    let mut page = page.clone();
    page.finalizers_mut().retain(|f| f != PAGE_FINALIZER);
    Some(page)
}
