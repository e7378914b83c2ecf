//! CRD Generator
//!
//! Prints the `Site` and `Page` CustomResourceDefinitions as a multi-document YAML
//! stream, e.g. `cargo run --bin crdgen > config/crd/all.yaml`.

use kube::CustomResourceExt;
use site_page_controller::{Page, Site};

fn main() -> anyhow::Result<()> {
    let site = serde_yaml::to_string(&Site::crd())?;
    let page = serde_yaml::to_string(&Page::crd())?;
    print!("{site}---\n{page}");
    Ok(())
}
