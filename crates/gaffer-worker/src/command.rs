//! Helm lifecycle commands run by worker pods

use std::fmt;
use std::str::FromStr;

use gaffer_common::VALUES_FILE_KEY;

/// Directory the values Secret is mounted at inside the worker container
pub const VALUES_MOUNT_PATH: &str = "/values";

/// A Helm action carried out by one worker pod
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleCommand {
    /// `helm install` for a newly created Gaffer
    Install,
    /// `helm upgrade` after a spec change
    Upgrade,
    /// `helm uninstall` after the Gaffer is deleted
    Uninstall,
}

impl LifecycleCommand {
    /// Lowercase name used in pod names, labels and as the Helm verb
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleCommand::Install => "install",
            LifecycleCommand::Upgrade => "upgrade",
            LifecycleCommand::Uninstall => "uninstall",
        }
    }

    /// Whether the command reads a values Secret
    pub fn needs_values(&self) -> bool {
        !matches!(self, LifecycleCommand::Uninstall)
    }

    /// Arguments passed to the `helm` binary.
    ///
    /// Install and upgrade share one argument list; upgrade swaps the verb and
    /// appends `--reuse-values --cleanup-on-fail`.
    pub fn helm_args(
        &self,
        release: &str,
        namespace: &str,
        repo: &str,
        chart: &str,
    ) -> Vec<String> {
        match self {
            LifecycleCommand::Uninstall => vec![
                self.as_str().to_string(),
                release.to_string(),
                "--namespace".to_string(),
                namespace.to_string(),
            ],
            LifecycleCommand::Install | LifecycleCommand::Upgrade => {
                let mut args = vec![
                    self.as_str().to_string(),
                    release.to_string(),
                    chart.to_string(),
                    "--repo".to_string(),
                    repo.to_string(),
                    "--values".to_string(),
                    values_file_path(),
                    "--namespace".to_string(),
                    namespace.to_string(),
                ];
                if *self == LifecycleCommand::Upgrade {
                    args.push("--reuse-values".to_string());
                    args.push("--cleanup-on-fail".to_string());
                }
                args
            }
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "install" => Ok(LifecycleCommand::Install),
            "upgrade" => Ok(LifecycleCommand::Upgrade),
            "uninstall" => Ok(LifecycleCommand::Uninstall),
            other => Err(format!("unknown lifecycle command '{}'", other)),
        }
    }
}

/// Path of the rendered values file inside the worker container
pub fn values_file_path() -> String {
    format!("{}/{}", VALUES_MOUNT_PATH, VALUES_FILE_KEY)
}
