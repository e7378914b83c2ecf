//! External route (Ingress) of a Site: the configured host, `/` to the Service's `http` port.

use crate::config::ControllerConfig;
use crate::constants::HTTP_PORT_NAME;
use crate::controller::ownership::{child_metadata, workload_name};
use crate::crd::Site;
use crate::error::Result;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use kube::ResourceExt;

pub(super) fn desired(site: &Site, config: &ControllerConfig) -> Result<Ingress> {
    let name = workload_name(&site.name_any());
    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: name.clone(),
            port: Some(ServiceBackendPort {
                name: Some(HTTP_PORT_NAME.to_string()),
                ..ServiceBackendPort::default()
            }),
        }),
        ..IngressBackend::default()
    };

    Ok(Ingress {
        metadata: child_metadata(site, name)?,
        spec: Some(IngressSpec {
            ingress_class_name: Some(config.ingress_class.clone()),
            rules: Some(vec![IngressRule {
                host: Some(config.ingress_domain.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    })
}
