//! # Custom Resource Definitions
//!
//! CRD types for the Site/Page Controller.
//!
//! A `Site` declares an nginx workload (image + replica count); a `Page` declares one
//! named piece of content served by the Site it references. Status types live in
//! [`status`].

mod page;
mod site;
pub mod status;

pub use page::{Page, PageSpec, PageStatus};
pub use site::{Site, SiteSpec, SiteStatus};
pub use status::{Condition, ConditionStatus};
