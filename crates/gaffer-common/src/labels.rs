//! Label conventions shared by the Helm chart, the worker pods and the watchers
//!
//! The Gaffer chart labels everything it installs with the standard
//! `app.kubernetes.io/*` keys, using the Helm release name (which is the
//! Gaffer resource name) as the instance. Worker pods add the `gaffer.*` and
//! `goal` keys so they can be traced back to the resource that spawned them.

use std::collections::BTreeMap;

/// Standard application name label
pub const NAME_LABEL: &str = "app.kubernetes.io/name";
/// Standard component label (`api`, `ui`, `worker`, ...)
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";
/// Standard instance label, set to the Helm release name
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
/// Standard managed-by label
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Name of the Gaffer resource that owns a worker pod
pub const GAFFER_NAME_LABEL: &str = "gaffer.name";
/// Namespace of the Gaffer resource that owns a worker pod
pub const GAFFER_NAMESPACE_LABEL: &str = "gaffer.namespace";
/// Lifecycle command a worker pod runs
pub const GOAL_LABEL: &str = "goal";

/// Value of [`NAME_LABEL`] on everything the Gaffer chart installs
pub const GAFFER_APP_NAME: &str = "gaffer";
/// REST API component
pub const API_COMPONENT: &str = "api";
/// Web UI component
pub const UI_COMPONENT: &str = "ui";
/// Helm worker pod component
pub const WORKER_COMPONENT: &str = "worker";
/// Value of [`MANAGED_BY_LABEL`] on objects this operator creates
pub const MANAGED_BY: &str = "gaffer-operator";

/// Whether a Deployment's labels mark it as a Gaffer REST API
pub fn is_gaffer_api_deployment(labels: Option<&BTreeMap<String, String>>) -> bool {
    let Some(labels) = labels else {
        return false;
    };
    labels.get(NAME_LABEL).map(String::as_str) == Some(GAFFER_APP_NAME)
        && labels.get(COMPONENT_LABEL).map(String::as_str) == Some(API_COMPONENT)
}

/// Helm release (and therefore Gaffer resource) name from the instance label
pub fn instance_name(labels: Option<&BTreeMap<String, String>>) -> Option<&str> {
    labels?
        .get(INSTANCE_LABEL)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// Label selector for the API and UI Deployments installed for `release`
pub fn release_components_selector(release: &str) -> String {
    format!(
        "{}={},{}={},{} in ({},{})",
        NAME_LABEL,
        GAFFER_APP_NAME,
        INSTANCE_LABEL,
        release,
        COMPONENT_LABEL,
        API_COMPONENT,
        UI_COMPONENT
    )
}

/// Label selector for every Gaffer REST API Deployment
pub fn api_deployments_selector() -> String {
    format!(
        "{}={},{}={}",
        NAME_LABEL, GAFFER_APP_NAME, COMPONENT_LABEL, API_COMPONENT
    )
}
