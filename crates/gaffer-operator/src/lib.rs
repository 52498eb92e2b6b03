//! Gaffer operator
//!
//! Watches `Gaffer` resources and the Deployments the Gaffer Helm chart
//! creates. Lifecycle changes to a Gaffer are handed to Helm worker pods;
//! REST API readiness is written back onto the Gaffer's status.

#![deny(missing_docs)]

pub mod controller;
pub mod controller_runner;
pub mod informer;
pub mod kube_client;

pub use gaffer_common::crd;
pub use gaffer_common::{Error, Result};
