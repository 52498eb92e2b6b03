//! Watch loop construction
//!
//! Returns one boxed future per watched kind. The Gaffer and Deployment
//! streams run independently, so a slow Deployment handler never holds up
//! Gaffer events and vice versa.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client};

use gaffer_common::crd::Gaffer;
use gaffer_common::labels::api_deployments_selector;

use crate::controller::{on_deployment_event, on_gaffer_event, Context};
use crate::informer::watch_and_dispatch;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Build the Gaffer and REST API Deployment watch loops.
///
/// With `namespace` set, both watches are restricted to it.
pub fn build_watchers(
    client: Client,
    namespace: Option<&str>,
    ctx: Arc<Context>,
) -> Vec<Pin<Box<dyn Future<Output = ()> + Send>>> {
    let gaffers: Api<Gaffer> = api(client.clone(), namespace);
    let deployments: Api<Deployment> = api(client, namespace);

    tracing::info!("- Gaffer watcher");
    tracing::info!("- Gaffer REST API Deployment watcher");

    vec![
        Box::pin(watch_and_dispatch(
            gaffers,
            gaffer_watch_config(),
            "Gaffer",
            ctx.clone(),
            on_gaffer_event,
        )),
        Box::pin(watch_and_dispatch(
            deployments,
            deployment_watch_config(),
            "Deployment",
            ctx,
            on_deployment_event,
        )),
    ]
}

fn gaffer_watch_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

fn deployment_watch_config() -> WatcherConfig {
    WatcherConfig::default()
        .timeout(WATCH_TIMEOUT_SECS)
        .labels(&api_deployments_selector())
}
