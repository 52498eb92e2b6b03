//! Worker side of the Gaffer operator
//!
//! Helm never runs inside the operator. Each lifecycle change is carried out by
//! a short-lived pod running the Helm CLI, fed by a Secret holding the rendered
//! values overlay. This crate builds both.

#![deny(missing_docs)]

pub mod command;
pub mod config;
pub mod credentials;
pub mod pod;

pub use command::LifecycleCommand;
pub use config::WorkerConfig;
pub use credentials::{generate_password, is_values_secret_of, CredentialFactory, ALPHANUMERIC};
pub use pod::{build_worker_pod, is_pod_finished, worker_pod_name};
