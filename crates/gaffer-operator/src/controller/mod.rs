//! Reconcilers for Gaffer resources and their REST API Deployments

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kube::Client;
use tokio::sync::OwnedMutexGuard;

use gaffer_worker::{CredentialFactory, WorkerConfig};

use crate::kube_client::{GafferKubeClient, GafferKubeClientImpl};

pub mod deployment;
pub mod dispatch;
pub mod status;

pub use deployment::on_gaffer_event;
pub use dispatch::{dispatch_worker, DispatchOutcome};
pub use status::on_deployment_event;

/// How often to check whether a finished worker pod has been removed
const DEFAULT_POD_DELETE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Serializes event handling per Gaffer.
///
/// Events are handled on their own tasks, so without this an added and an
/// updated event for one Gaffer could both write its values Secret at once.
#[derive(Default)]
pub struct GafferLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GafferLocks {
    fn key(namespace: &str, name: &str) -> String {
        format!("{}/{}", namespace, name)
    }

    /// Wait until no other task is handling `namespace/name`
    pub async fn lock(&self, namespace: &str, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(Self::key(namespace, name))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Forget the lock of a deleted Gaffer once nobody holds or waits on it
    pub fn release(&self, namespace: &str, name: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let key = Self::key(namespace, name);
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    /// Number of Gaffers with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no lock entries are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared state for both reconcilers
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn GafferKubeClient>,
    /// Worker pod settings
    pub worker: WorkerConfig,
    /// Values Secret builder
    pub credentials: CredentialFactory,
    /// Poll interval while waiting for a finished worker pod to disappear
    pub pod_delete_poll_interval: Duration,
    /// Per-Gaffer event serialization
    pub gaffer_locks: GafferLocks,
}

impl Context {
    /// Create a new context with the given Kubernetes client
    pub fn new(client: Client, worker: WorkerConfig) -> Self {
        Self {
            kube: Arc::new(GafferKubeClientImpl::new(client)),
            credentials: CredentialFactory::from_config(&worker),
            worker,
            pod_delete_poll_interval: DEFAULT_POD_DELETE_POLL_INTERVAL,
            gaffer_locks: GafferLocks::default(),
        }
    }

    /// Create a context for testing with a custom client
    pub fn for_testing(kube: Arc<dyn GafferKubeClient>) -> Self {
        let worker = WorkerConfig::default();
        Self {
            kube,
            credentials: CredentialFactory::from_config(&worker),
            worker,
            pod_delete_poll_interval: Duration::ZERO,
            gaffer_locks: GafferLocks::default(),
        }
    }
}
