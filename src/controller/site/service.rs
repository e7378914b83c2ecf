//! Network endpoint (Service) of a Site: port 80 named `http` in front of the workload.

use crate::constants::{HTTP_PORT, HTTP_PORT_NAME};
use crate::controller::ownership::{child_labels, child_metadata, workload_name};
use crate::crd::Site;
use crate::error::Result;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

pub(super) fn desired(site: &Site) -> Result<Service> {
    let site_name = site.name_any();
    Ok(Service {
        metadata: child_metadata(site, workload_name(&site_name))?,
        spec: Some(ServiceSpec {
            selector: Some(child_labels(&site_name)),
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.to_string()),
                port: HTTP_PORT,
                target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_string())),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SiteSpec;

    #[test]
    fn test_service_selects_workload_labels() {
        let mut site = Site::new(
            "s1",
            SiteSpec {
                image: "x:1".to_string(),
                replica_count: 1,
            },
        );
        site.metadata.namespace = Some("web".to_string());
        site.metadata.uid = Some("uid-1".to_string());

        let service = desired(&site).unwrap();
        assert_eq!(service.metadata.name.as_deref(), Some("s1"));
        let spec = service.spec.unwrap();
        assert_eq!(spec.selector, Some(child_labels("s1")));
        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.name.as_deref(), Some("http"));
    }
}
