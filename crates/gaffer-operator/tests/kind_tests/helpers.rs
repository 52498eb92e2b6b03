//! Test helpers for integration tests

use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tokio::time::sleep;

use gaffer_common::kube_utils::{create_client, ensure_gaffer_crd};

/// Namespace used by the integration tests
pub const TEST_NAMESPACE: &str = "gaffer-operator-it";

/// Connect to the current cluster and make sure the CRD and namespace exist
pub async fn test_client() -> Client {
    let client = create_client(None)
        .await
        .expect("kubeconfig for a test cluster");
    ensure_gaffer_crd(&client).await.expect("install Gaffer CRD");

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {}
        Err(kube::Error::Api(e)) if e.code == 409 => {}
        Err(e) => panic!("failed to create test namespace: {e}"),
    }

    client
}

/// Poll `check` every second until it returns true or `timeout` elapses
pub async fn wait_for<F, Fut>(timeout: Duration, what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        sleep(Duration::from_secs(1)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Delete a namespaced object, ignoring NotFound
pub async fn cleanup<K>(api: &Api<K>, name: &str)
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let _ = api.delete(name, &DeleteParams::default()).await;
}
