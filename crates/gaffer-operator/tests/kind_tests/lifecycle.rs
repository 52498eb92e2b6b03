//! Stories about a Gaffer's lifecycle as seen through the API server

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, PostParams};

use gaffer_common::crd::{Gaffer, GafferSpec};
use gaffer_common::{SpecTree, VALUES_FILE_KEY};
use gaffer_operator::controller::Context;
use gaffer_operator::controller_runner::build_watchers;
use gaffer_worker::WorkerConfig;

use super::helpers::{cleanup, test_client, wait_for, TEST_NAMESPACE};

/// Story: creating a Gaffer produces a values Secret and an install worker
#[tokio::test]
#[ignore = "requires a kind cluster"]
async fn story_created_gaffer_gets_install_worker() {
    let client = test_client().await;
    let name = "it-demo";

    let ctx = Arc::new(Context::new(client.clone(), WorkerConfig::default()));
    let watchers = build_watchers(client.clone(), Some(TEST_NAMESPACE), ctx);
    let handles: Vec<_> = watchers.into_iter().map(tokio::spawn).collect();

    let gaffers: Api<Gaffer> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let secrets: Api<Secret> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let pods: Api<Pod> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    cleanup(&gaffers, name).await;
    cleanup(&pods, &format!("{name}-install-worker")).await;

    let values: SpecTree =
        serde_yaml::from_str("graph:\n  config:\n    graphId: itGraph\n").expect("values");
    gaffers
        .create(&PostParams::default(), &Gaffer::new(name, GafferSpec { values }))
        .await
        .expect("create Gaffer");

    let (secrets_ref, pods_ref) = (&secrets, &pods);
    wait_for(Duration::from_secs(30), "values Secret", move || async move {
        matches!(secrets_ref.get_opt(name).await, Ok(Some(_)))
    })
    .await;
    wait_for(Duration::from_secs(30), "install worker pod", move || async move {
        let pod_name = format!("{name}-install-worker");
        matches!(pods_ref.get_opt(&pod_name).await, Ok(Some(_)))
    })
    .await;

    let secret = secrets.get(name).await.expect("secret");
    let data = secret.data.expect("secret data");
    let yaml = String::from_utf8(data[VALUES_FILE_KEY].0.clone()).expect("utf8 values");
    let rendered: SpecTree = serde_yaml::from_str(&yaml).expect("values yaml");
    assert!(rendered
        .get_str(&["accumulo", "config", "userManagement", "rootPassword"])
        .is_some());

    cleanup(&gaffers, name).await;
    cleanup(&pods, &format!("{name}-install-worker")).await;
    for handle in handles {
        handle.abort();
    }
}
