//! Gaffer CRD types
//!
//! A `Gaffer` describes one graph database instance. Its spec is an opaque
//! Helm values overlay (see [`SpecTree`]), so the CRD schema preserves unknown
//! fields instead of describing the chart's values.

use std::fmt;

use kube::{CustomResource, ResourceExt};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::UNKNOWN_CONTEXT;
use crate::{Error, SpecTree};

/// Observed health of a Gaffer's REST API
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestApiStatus {
    /// At least one REST API replica is ready
    Up,
    /// No REST API replica is ready
    Down,
}

impl RestApiStatus {
    /// Derive the status from a Deployment's ready replica count
    pub fn from_ready_replicas(ready_replicas: Option<i32>) -> Self {
        if ready_replicas.unwrap_or(0) >= 1 {
            RestApiStatus::Up
        } else {
            RestApiStatus::Down
        }
    }
}

impl fmt::Display for RestApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestApiStatus::Up => write!(f, "UP"),
            RestApiStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Status subresource of a Gaffer
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GafferStatus {
    /// REST API health, unset until the first API Deployment update is seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_api_status: Option<RestApiStatus>,

    /// Human readable problems reported against this instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

/// Specification for a Gaffer graph instance
///
/// The whole spec is handed to Helm as a values overlay for the Gaffer chart.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "gchq.gov.uk",
    version = "v1",
    kind = "Gaffer",
    plural = "gaffers",
    namespaced,
    status = "GafferStatus",
    printcolumn = r#"{"name":"REST API","type":"string","jsonPath":".status.restApiStatus"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(transparent)]
pub struct GafferSpec {
    /// Helm values overlay
    pub values: SpecTree,
}

impl JsonSchema for GafferSpec {
    fn schema_name() -> String {
        "GafferSpec".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            ..Default::default()
        };
        schema.extensions.insert(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        );
        Schema::Object(schema)
    }
}

impl Gaffer {
    /// Name and namespace of this resource.
    ///
    /// Both are required to build a worker pod or values Secret.
    pub fn identity(&self) -> Result<(String, String), Error> {
        let name = self.metadata.name.clone().ok_or_else(|| {
            Error::validation_for_field(UNKNOWN_CONTEXT, "metadata.name", "Gaffer has no name")
        })?;
        let namespace = self.namespace().ok_or_else(|| {
            Error::validation_for_field(&name, "metadata.namespace", "Gaffer has no namespace")
        })?;
        Ok((name, namespace))
    }

    /// Currently recorded REST API status, if any
    pub fn rest_api_status(&self) -> Option<RestApiStatus> {
        self.status.as_ref().and_then(|s| s.rest_api_status)
    }
}
