//! Gaffer lifecycle reconciler
//!
//! Maps Gaffer events to Helm worker pods:
//! - added: render a values Secret and dispatch `install`
//! - updated (spec changed): re-render the Secret and dispatch `upgrade`
//! - deleted: dispatch `uninstall` and remove the chart's API and UI Deployments
//!
//! Credentials are only generated for a first install. A Gaffer whose values
//! Secret already exists and is owned by it (e.g. after an operator restart) is
//! upgraded instead, so its passwords stay the same. A Secret left by an
//! earlier Gaffer with the same name does not count.
//!
//! Events for one Gaffer are handled one at a time, and the values Secret is
//! never rewritten while an install or upgrade worker still needs it.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use gaffer_common::crd::Gaffer;
use gaffer_common::labels::release_components_selector;
use gaffer_common::Result;
use gaffer_worker::{build_worker_pod, is_values_secret_of, LifecycleCommand};

use super::dispatch::{dispatch_worker, unfinished_worker, DispatchOutcome};
use super::Context;
use crate::informer::ResourceEvent;

/// Workers that mount the values Secret
const VALUES_WORKERS: [LifecycleCommand; 2] =
    [LifecycleCommand::Install, LifecycleCommand::Upgrade];

/// Handle one Gaffer event
pub async fn on_gaffer_event(event: ResourceEvent<Gaffer>, ctx: Arc<Context>) -> Result<()> {
    let (name, namespace) = event.object().identity()?;
    let guard = ctx.gaffer_locks.lock(&namespace, &name).await;

    match event {
        ResourceEvent::Added(gaffer) => reconcile_spec(&gaffer, &ctx).await,
        ResourceEvent::Updated { old, new } => {
            if spec_changed(&old, &new) {
                reconcile_spec(&new, &ctx).await
            } else {
                debug!(gaffer = %name, "Spec unchanged, skipping upgrade");
                Ok(())
            }
        }
        ResourceEvent::Deleted(gaffer) => {
            let result = reconcile_deleted(&gaffer, &ctx).await;
            drop(guard);
            ctx.gaffer_locks.release(&namespace, &name);
            result
        }
    }
}

/// Whether an update touched the spec rather than only status or metadata.
///
/// Uses `metadata.generation` when the API server set it on both versions.
pub fn spec_changed(old: &Gaffer, new: &Gaffer) -> bool {
    match (old.metadata.generation, new.metadata.generation) {
        (Some(old_gen), Some(new_gen)) => old_gen != new_gen,
        _ => old.spec != new.spec,
    }
}

/// Install or upgrade to the current spec.
///
/// The command depends on the values Secret, not on the event type: without a
/// Secret owned by this Gaffer nothing was installed for it yet.
async fn reconcile_spec(gaffer: &Gaffer, ctx: &Context) -> Result<()> {
    let (name, namespace) = gaffer.identity()?;

    if let Some(busy) = unfinished_worker(&name, &namespace, &VALUES_WORKERS, ctx).await? {
        warn!(
            gaffer = %name,
            namespace = %namespace,
            worker = %busy,
            "Worker still running, change skipped until the next spec edit"
        );
        return Ok(());
    }

    match ctx.kube.get_secret(&name, &namespace).await? {
        Some(secret) if is_values_secret_of(&secret, gaffer) => {
            install_or_upgrade(gaffer, LifecycleCommand::Upgrade, false, ctx).await
        }
        Some(_) => {
            info!(
                gaffer = %name,
                namespace = %namespace,
                "Values Secret belongs to an earlier Gaffer, installing from scratch"
            );
            install_or_upgrade(gaffer, LifecycleCommand::Install, true, ctx).await
        }
        None => install_or_upgrade(gaffer, LifecycleCommand::Install, true, ctx).await,
    }
}

#[instrument(
    skip(gaffer, ctx),
    fields(gaffer = %gaffer.metadata.name.as_deref().unwrap_or_default())
)]
async fn install_or_upgrade(
    gaffer: &Gaffer,
    command: LifecycleCommand,
    is_initial_install: bool,
    ctx: &Context,
) -> Result<()> {
    let (name, namespace) = gaffer.identity()?;
    info!(namespace = %namespace, "Received request");

    let secret = ctx
        .credentials
        .build_values_secret(gaffer, is_initial_install)?;
    if let Err(e) = ctx.kube.apply_secret(&secret).await {
        error!(
            namespace = %namespace,
            error = %e,
            status_code = ?e.status_code(),
            "Failed to write values Secret"
        );
        return Err(e);
    }
    info!(namespace = %namespace, secret = %name, "Secret created");

    let pod = build_worker_pod(gaffer, command, Some(&name), &ctx.worker)?;
    let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
    match dispatch_worker(&pod, ctx).await? {
        DispatchOutcome::Created => {
            info!(namespace = %namespace, pod = %pod_name, "Pod dispatched")
        }
        DispatchOutcome::AlreadyRunning => warn!(
            namespace = %namespace,
            pod = %pod_name,
            "Worker already running, change skipped until the next spec edit"
        ),
    }
    Ok(())
}

#[instrument(
    skip(gaffer, ctx),
    fields(gaffer = %gaffer.metadata.name.as_deref().unwrap_or_default())
)]
async fn reconcile_deleted(gaffer: &Gaffer, ctx: &Context) -> Result<()> {
    let (name, namespace) = gaffer.identity()?;
    info!(namespace = %namespace, "Received delete");

    let deployments = ctx
        .kube
        .list_deployments(&namespace, &release_components_selector(&name))
        .await?;
    if deployments.is_empty() {
        info!(namespace = %namespace, "No Gaffer Deployments found, nothing to uninstall");
        return Ok(());
    }

    let pod = build_worker_pod(gaffer, LifecycleCommand::Uninstall, None, &ctx.worker)?;
    let outcome = dispatch_worker(&pod, ctx).await?;
    info!(namespace = %namespace, ?outcome, "Uninstall dispatched");

    let mut first_error = None;
    for deployment in deployments {
        let Some(deployment_name) = deployment.metadata.name else {
            continue;
        };
        match ctx.kube.delete_deployment(&deployment_name, &namespace).await {
            Ok(()) => info!(
                namespace = %namespace,
                deployment = %deployment_name,
                "Deleted Deployment"
            ),
            Err(e) => {
                error!(
                    namespace = %namespace,
                    deployment = %deployment_name,
                    error = %e,
                    "Failed to delete Deployment"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
