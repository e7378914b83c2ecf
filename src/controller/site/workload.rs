//! Workload (Deployment) of a Site: one nginx container serving the page data.

use super::Drift;
use crate::constants::{
    CONTAINER_NAME, DATA_MOUNT_PATH, DATA_VOLUME, HTTP_PORT, HTTP_PORT_NAME,
    STATIC_CONFIG_MOUNT_PATH, STATIC_CONFIG_VOLUME,
};
use crate::controller::ownership::{
    child_labels, child_metadata, data_config_name, static_config_name, workload_name,
};
use crate::crd::Site;
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

pub(super) fn desired(site: &Site) -> Result<Deployment> {
    let site_name = site.name_any();
    let labels = child_labels(&site_name);

    Ok(Deployment {
        metadata: child_metadata(site, workload_name(&site_name))?,
        spec: Some(DeploymentSpec {
            replicas: Some(site.spec.replica_count),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container(site)],
                    volumes: Some(vec![
                        config_map_volume(STATIC_CONFIG_VOLUME, static_config_name(&site_name)),
                        config_map_volume(DATA_VOLUME, data_config_name(&site_name)),
                    ]),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

fn container(site: &Site) -> Container {
    Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(site.spec.image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some(HTTP_PORT_NAME.to_string()),
            container_port: HTTP_PORT,
            ..ContainerPort::default()
        }]),
        volume_mounts: Some(vec![
            read_only_mount(STATIC_CONFIG_VOLUME, STATIC_CONFIG_MOUNT_PATH),
            read_only_mount(DATA_VOLUME, DATA_MOUNT_PATH),
        ]),
        ..Container::default()
    }
}

fn config_map_volume(volume: &str, config_map: String) -> Volume {
    Volume {
        name: volume.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map,
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }
}

fn read_only_mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..VolumeMount::default()
    }
}

/// Exactly one container is required; image and replica count follow the Site spec
pub(super) fn drift(site: &Site, mut existing: Deployment) -> Drift<Deployment> {
    let containers = existing
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map_or(0, |pod| pod.containers.len());
    if containers != 1 {
        return Drift::Corrupt(Error::CorruptWorkload {
            name: existing.name_any(),
            containers,
        });
    }

    let Some(spec) = existing.spec.as_mut() else {
        return Drift::InSync;
    };
    let Some(container) = spec
        .template
        .spec
        .as_mut()
        .and_then(|pod| pod.containers.first_mut())
    else {
        return Drift::InSync;
    };

    let image_differs = container.image.as_deref() != Some(site.spec.image.as_str());
    let replicas_differ = spec.replicas != Some(site.spec.replica_count);
    if !image_differs && !replicas_differ {
        return Drift::InSync;
    }

    container.image = Some(site.spec.image.clone());
    spec.replicas = Some(site.spec.replica_count);
    Drift::Update(existing)
}
