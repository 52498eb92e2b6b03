//! Worker pod configuration
//!
//! Flattened into the operator CLI; every field can also be set from the
//! environment of the operator Deployment.

use clap::Args;

/// Default worker image
pub const DEFAULT_WORKER_IMAGE: &str = "alpine/helm:3.2.1";
/// Default image pull policy
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";
/// Default Helm chart repository
pub const DEFAULT_HELM_REPO: &str = "https://gchq.github.io/gaffer-docker";
/// Default chart name
pub const DEFAULT_HELM_CHART: &str = "gaffer";
/// Default worker ServiceAccount
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "gaffer-operator-worker";
/// Default worker restart policy
pub const DEFAULT_RESTART_POLICY: &str = "Never";
/// Default generated password length
pub const DEFAULT_PASSWORD_LENGTH: usize = 10;

/// Settings injected into every worker pod and values Secret
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Image that provides the `helm` binary
    #[arg(long = "worker-image", env = "WORKER_IMAGE", default_value = DEFAULT_WORKER_IMAGE)]
    pub image: String,

    /// Image pull policy for the worker container
    #[arg(
        long = "worker-image-pull-policy",
        env = "WORKER_IMAGE_PULL_POLICY",
        default_value = DEFAULT_IMAGE_PULL_POLICY
    )]
    pub image_pull_policy: String,

    /// Helm chart repository URL
    #[arg(
        long = "worker-helm-repo",
        env = "WORKER_HELM_REPO",
        default_value = DEFAULT_HELM_REPO
    )]
    pub helm_repo: String,

    /// Chart name inside the repository
    #[arg(
        long = "worker-helm-chart",
        env = "WORKER_HELM_CHART",
        default_value = DEFAULT_HELM_CHART
    )]
    pub helm_chart: String,

    /// ServiceAccount the worker runs as. Needs rights to manage the chart's objects.
    #[arg(
        long = "worker-service-account",
        env = "WORKER_SERVICE_ACCOUNT_NAME",
        default_value = DEFAULT_SERVICE_ACCOUNT_NAME
    )]
    pub service_account_name: String,

    /// Pod restart policy
    #[arg(
        long = "worker-restart-policy",
        env = "WORKER_RESTART_POLICY",
        default_value = DEFAULT_RESTART_POLICY
    )]
    pub restart_policy: String,

    /// Length of generated passwords
    #[arg(
        long = "generated-password-length",
        env = "GENERATED_PASSWORD_LENGTH",
        default_value_t = DEFAULT_PASSWORD_LENGTH
    )]
    pub password_length: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_WORKER_IMAGE.to_string(),
            image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
            helm_repo: DEFAULT_HELM_REPO.to_string(),
            helm_chart: DEFAULT_HELM_CHART.to_string(),
            service_account_name: DEFAULT_SERVICE_ACCOUNT_NAME.to_string(),
            restart_policy: DEFAULT_RESTART_POLICY.to_string(),
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}
