//! REST API status reconciler
//!
//! Watches the REST API Deployments the Gaffer chart creates and mirrors
//! their readiness onto `status.restApiStatus` of the owning Gaffer.
//!
//! Only updates are handled. A new Gaffer is assumed down until its API
//! Deployment reports otherwise, and deletion is the lifecycle reconciler's
//! business. The read-then-patch below is not atomic; two concurrent updates
//! can race, but the next Deployment update writes the right value again.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use gaffer_common::crd::RestApiStatus;
use gaffer_common::labels::{instance_name, is_gaffer_api_deployment};
use gaffer_common::Result;

use super::Context;
use crate::informer::ResourceEvent;

/// REST API status implied by a Deployment's ready replicas
pub fn desired_status(deployment: &Deployment) -> RestApiStatus {
    RestApiStatus::from_ready_replicas(deployment.status.as_ref().and_then(|s| s.ready_replicas))
}

/// The status to write, or `None` if `current` already matches
pub fn status_transition(
    current: Option<RestApiStatus>,
    desired: RestApiStatus,
) -> Option<RestApiStatus> {
    match current {
        Some(current) if current == desired => None,
        _ => Some(desired),
    }
}

/// Handle one Deployment event
pub async fn on_deployment_event(
    event: ResourceEvent<Deployment>,
    ctx: Arc<Context>,
) -> Result<()> {
    match event {
        ResourceEvent::Updated { new, .. } => reconcile_api_status(&new, &ctx).await,
        ResourceEvent::Added(_) | ResourceEvent::Deleted(_) => Ok(()),
    }
}

#[instrument(skip(deployment, ctx), fields(deployment = %deployment.name_any()))]
async fn reconcile_api_status(deployment: &Deployment, ctx: &Context) -> Result<()> {
    let labels = deployment.metadata.labels.as_ref();
    if !is_gaffer_api_deployment(labels) {
        return Ok(());
    }

    let Some(namespace) = deployment.namespace() else {
        error!("Gaffer API Deployment has no namespace, this should never happen");
        return Ok(());
    };
    let Some(gaffer_name) = instance_name(labels) else {
        warn!(namespace = %namespace, "Gaffer API Deployment has no instance label, skipping");
        return Ok(());
    };

    let desired = desired_status(deployment);

    let gaffer = match ctx.kube.get_gaffer(gaffer_name, &namespace).await {
        Ok(Some(gaffer)) => gaffer,
        Ok(None) => {
            warn!(
                gaffer = %gaffer_name,
                namespace = %namespace,
                "No Gaffer found for API Deployment"
            );
            return Ok(());
        }
        Err(e) => {
            error!(
                gaffer = %gaffer_name,
                namespace = %namespace,
                error = %e,
                "Failed to get Gaffer"
            );
            return Err(e);
        }
    };

    let Some(status) = status_transition(gaffer.rest_api_status(), desired) else {
        debug!(
            gaffer = %gaffer_name,
            namespace = %namespace,
            status = %desired,
            "REST API status unchanged"
        );
        return Ok(());
    };

    if let Err(e) = ctx
        .kube
        .patch_rest_api_status(gaffer_name, &namespace, status)
        .await
    {
        error!(
            gaffer = %gaffer_name,
            namespace = %namespace,
            error = %e,
            status_code = ?e.status_code(),
            "Failed to patch REST API status"
        );
        return Err(e);
    }

    info!(
        gaffer = %gaffer_name,
        namespace = %namespace,
        status = %status,
        "REST API status updated"
    );
    Ok(())
}
