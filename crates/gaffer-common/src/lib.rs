//! Common types for the Gaffer operator: CRD, spec tree, labels, errors and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod labels;
pub mod spec_tree;
pub mod telemetry;

pub use error::Error;
pub use spec_tree::{Scalar, SpecMap, SpecNode, SpecTree, SpecTreeError};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for every server-side apply and status patch
pub const FIELD_MANAGER: &str = "gaffer-operator";

/// Key inside the values Secret that holds the rendered Helm values
pub const VALUES_FILE_KEY: &str = "values.yaml";
