//! Worker pod dispatch
//!
//! Worker pod names are deterministic, so the pod name doubles as a lock: while
//! a pod for a Gaffer and command is pending or running, no second one is
//! created. A finished pod is removed first so the name can be reused.

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

use gaffer_common::kube_utils::is_conflict;
use gaffer_common::{Error, Result};
use gaffer_worker::pod::pod_phase;
use gaffer_worker::{is_pod_finished, worker_pod_name, LifecycleCommand};

use super::Context;

/// Polls to wait for a deleted worker pod before giving up
const MAX_POD_DELETE_POLLS: u32 = 20;

/// Result of a dispatch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new worker pod was created
    Created,
    /// A worker pod with the same name is still pending or running
    AlreadyRunning,
}

/// Create `pod` unless an unfinished pod with the same name exists
pub async fn dispatch_worker(pod: &Pod, ctx: &Context) -> Result<DispatchOutcome> {
    let (name, namespace) = match (&pod.metadata.name, &pod.metadata.namespace) {
        (Some(name), Some(namespace)) => (name.as_str(), namespace.as_str()),
        _ => {
            return Err(Error::internal_with_context(
                "dispatch",
                "worker pod is missing name or namespace",
            ))
        }
    };

    if let Some(existing) = ctx.kube.get_pod(name, namespace).await? {
        if !is_pod_finished(&existing) {
            info!(
                pod = %name,
                namespace = %namespace,
                phase = ?pod_phase(&existing),
                "Worker pod still running, not dispatching another"
            );
            return Ok(DispatchOutcome::AlreadyRunning);
        }

        debug!(
            pod = %name,
            namespace = %namespace,
            phase = ?pod_phase(&existing),
            "Removing finished worker pod"
        );
        ctx.kube.delete_pod(name, namespace).await?;
        wait_for_pod_deletion(name, namespace, ctx).await?;
    }

    match ctx.kube.create_pod(pod).await {
        Ok(()) => Ok(DispatchOutcome::Created),
        // Another task created it between our check and create
        Err(Error::Kube { source }) if is_conflict(&source) => {
            info!(pod = %name, namespace = %namespace, "Worker pod created concurrently");
            Ok(DispatchOutcome::AlreadyRunning)
        }
        Err(e) => Err(e),
    }
}

/// First of `commands` whose worker pod for `gaffer_name` is pending or running
pub async fn unfinished_worker(
    gaffer_name: &str,
    namespace: &str,
    commands: &[LifecycleCommand],
    ctx: &Context,
) -> Result<Option<LifecycleCommand>> {
    for &command in commands {
        let name = worker_pod_name(gaffer_name, command);
        if let Some(pod) = ctx.kube.get_pod(&name, namespace).await? {
            if !is_pod_finished(&pod) {
                return Ok(Some(command));
            }
        }
    }
    Ok(None)
}

async fn wait_for_pod_deletion(name: &str, namespace: &str, ctx: &Context) -> Result<()> {
    for _ in 0..MAX_POD_DELETE_POLLS {
        if ctx.kube.get_pod(name, namespace).await?.is_none() {
            return Ok(());
        }
        tokio::time::sleep(ctx.pod_delete_poll_interval).await;
    }
    Err(Error::internal_with_context(
        "dispatch",
        format!("worker pod {}/{} was not removed in time", namespace, name),
    ))
}
