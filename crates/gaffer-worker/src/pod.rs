//! Worker pod construction
//!
//! A worker pod runs a single `helm` container. Its name is derived from the
//! Gaffer name and the command, so at most one worker per Gaffer and command
//! can exist at a time.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, Pod, PodSpec, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use gaffer_common::crd::Gaffer;
use gaffer_common::labels::{
    COMPONENT_LABEL, GAFFER_APP_NAME, GAFFER_NAMESPACE_LABEL, GAFFER_NAME_LABEL, GOAL_LABEL,
    INSTANCE_LABEL, MANAGED_BY, MANAGED_BY_LABEL, NAME_LABEL, WORKER_COMPONENT,
};
use gaffer_common::{Error, Result};

use crate::command::{LifecycleCommand, VALUES_MOUNT_PATH};
use crate::config::WorkerConfig;

/// Name of the helm container
const CONTAINER_NAME: &str = "helm";
/// Name of the values volume and its mount
const VALUES_VOLUME_NAME: &str = "values";

/// Deterministic pod name for a Gaffer and command
pub fn worker_pod_name(gaffer_name: &str, command: LifecycleCommand) -> String {
    format!("{}-{}-worker", gaffer_name, command.as_str())
}

/// Labels attached to a worker pod
pub fn worker_labels(
    gaffer_name: &str,
    namespace: &str,
    command: LifecycleCommand,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(GAFFER_NAME_LABEL.to_string(), gaffer_name.to_string());
    labels.insert(GAFFER_NAMESPACE_LABEL.to_string(), namespace.to_string());
    labels.insert(GOAL_LABEL.to_string(), command.as_str().to_string());
    labels.insert(NAME_LABEL.to_string(), GAFFER_APP_NAME.to_string());
    labels.insert(INSTANCE_LABEL.to_string(), gaffer_name.to_string());
    labels.insert(COMPONENT_LABEL.to_string(), WORKER_COMPONENT.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

/// Build the worker pod running `command` for `gaffer`.
///
/// `secret_name` is the values Secret to mount. Install and upgrade require
/// one; uninstall never mounts anything, even when a name is passed.
pub fn build_worker_pod(
    gaffer: &Gaffer,
    command: LifecycleCommand,
    secret_name: Option<&str>,
    config: &WorkerConfig,
) -> Result<Pod> {
    let (name, namespace) = gaffer.identity()?;

    let secret_name = if command.needs_values() {
        Some(secret_name.ok_or_else(|| {
            Error::validation_for(&name, format!("{} worker requires a values Secret", command))
        })?)
    } else {
        None
    };

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.image.clone()),
        image_pull_policy: Some(config.image_pull_policy.clone()),
        command: Some(vec!["helm".to_string()]),
        args: Some(command.helm_args(&name, &namespace, &config.helm_repo, &config.helm_chart)),
        volume_mounts: secret_name.map(|_| {
            vec![VolumeMount {
                name: VALUES_VOLUME_NAME.to_string(),
                mount_path: VALUES_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]
        }),
        ..Default::default()
    };

    let volumes = secret_name.map(|secret| {
        vec![Volume {
            name: VALUES_VOLUME_NAME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }]
    });

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(worker_pod_name(&name, command)),
            namespace: Some(namespace.clone()),
            labels: Some(worker_labels(&name, &namespace, command)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes,
            service_account_name: Some(config.service_account_name.clone()),
            restart_policy: Some(config.restart_policy.clone()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Pod phase, if reported
pub fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// Check if a pod has run to completion, successfully or not
pub fn is_pod_finished(pod: &Pod) -> bool {
    matches!(pod_phase(pod), Some("Succeeded") | Some("Failed"))
}
