//! Gaffer Operator - installs Gaffer graph instances with Helm worker pods

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kube::CustomResourceExt;

use gaffer_common::crd::Gaffer;
use gaffer_common::kube_utils::{create_client, ensure_gaffer_crd};
use gaffer_common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use gaffer_operator::controller::Context;
use gaffer_operator::controller_runner::build_watchers;
use gaffer_worker::WorkerConfig;

/// Gaffer - Kubernetes operator for Gaffer graph databases
#[derive(Parser, Debug)]
#[command(name = "gaffer-operator", version, about, long_about = None)]
struct Cli {
    /// Print the Gaffer CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Do not install or update the Gaffer CRD on startup
    #[arg(long, env = "GAFFER_SKIP_CRD_INSTALL")]
    skip_crd_install: bool,

    /// Only watch this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Path to a kubeconfig (default: in-cluster config, then KUBECONFIG)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    #[command(flatten)]
    worker: WorkerConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Gaffer::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig::default())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = run(cli).await;
    shutdown_telemetry();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if cli.skip_crd_install {
        tracing::info!("Skipping Gaffer CRD installation");
    } else {
        tracing::info!("Installing Gaffer CRD...");
        ensure_gaffer_crd(&client)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install Gaffer CRD: {}", e))?;
    }

    tracing::info!(
        image = %cli.worker.image,
        chart = %cli.worker.helm_chart,
        repo = %cli.worker.helm_repo,
        namespace = cli.watch_namespace.as_deref().unwrap_or("<all>"),
        "Starting Gaffer operator"
    );

    let ctx = Arc::new(Context::new(client.clone(), cli.worker));
    let watchers = build_watchers(client, cli.watch_namespace.as_deref(), ctx);

    tokio::select! {
        _ = futures::future::join_all(watchers) => {
            tracing::warn!("All watchers stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    Ok(())
}
