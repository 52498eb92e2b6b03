//! Kubernetes API access for the reconcilers
//!
//! Every API call the reconcilers make goes through [`GafferKubeClient`], so
//! the reconcile logic can be exercised against mocks.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use gaffer_common::crd::{Gaffer, RestApiStatus};
use gaffer_common::kube_utils::is_not_found;
use gaffer_common::{Error, Result, FIELD_MANAGER};

/// Trait abstracting Kubernetes client operations for Gaffer reconciliation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GafferKubeClient: Send + Sync {
    /// Get a Secret by name, `None` if it does not exist
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>>;

    /// Create or replace a Secret with server-side apply
    async fn apply_secret(&self, secret: &Secret) -> Result<()>;

    /// Get a Pod by name, `None` if it does not exist
    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Option<Pod>>;

    /// Delete a Pod immediately. Deleting a missing Pod is not an error.
    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<()>;

    /// Create a Pod
    async fn create_pod(&self, pod: &Pod) -> Result<()>;

    /// List Deployments in `namespace` matching a label selector
    async fn list_deployments(&self, namespace: &str, selector: &str) -> Result<Vec<Deployment>>;

    /// Delete a Deployment. Deleting a missing Deployment is not an error.
    async fn delete_deployment(&self, name: &str, namespace: &str) -> Result<()>;

    /// Get a Gaffer by name, `None` if it does not exist
    async fn get_gaffer(&self, name: &str, namespace: &str) -> Result<Option<Gaffer>>;

    /// Set `status.restApiStatus` on a Gaffer
    async fn patch_rest_api_status(
        &self,
        name: &str,
        namespace: &str,
        status: RestApiStatus,
    ) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct GafferKubeClientImpl {
    client: Client,
}

impl GafferKubeClientImpl {
    /// Create a new GafferKubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn metadata_identity<'a>(
    kind: &str,
    name: Option<&'a String>,
    namespace: Option<&'a String>,
) -> Result<(&'a str, &'a str)> {
    match (name, namespace) {
        (Some(name), Some(namespace)) => Ok((name, namespace)),
        _ => Err(Error::internal_with_context(
            "kube_client",
            format!("{} is missing name or namespace", kind),
        )),
    }
}

#[async_trait]
impl GafferKubeClient for GafferKubeClientImpl {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<()> {
        let (name, namespace) = metadata_identity(
            "Secret",
            secret.metadata.name.as_ref(),
            secret.metadata.namespace.as_ref(),
        )?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(secret),
        )
        .await?;
        Ok(())
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Option<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..Default::default()
        };
        match api.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(pod = %name, namespace = %namespace, "Pod already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_pod(&self, pod: &Pod) -> Result<()> {
        let namespace = pod.metadata.namespace.as_deref().ok_or_else(|| {
            Error::internal_with_context("kube_client", "Pod is missing namespace")
        })?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), pod).await?;
        Ok(())
    }

    async fn list_deployments(&self, namespace: &str, selector: &str) -> Result<Vec<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }

    async fn delete_deployment(&self, name: &str, namespace: &str) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(deployment = %name, namespace = %namespace, "Deployment already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_gaffer(&self, name: &str, namespace: &str) -> Result<Option<Gaffer>> {
        let api: Api<Gaffer> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_rest_api_status(
        &self,
        name: &str,
        namespace: &str,
        status: RestApiStatus,
    ) -> Result<()> {
        let api: Api<Gaffer> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": {
                "restApiStatus": status
            }
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}
