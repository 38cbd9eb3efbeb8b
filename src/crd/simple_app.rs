//! SimpleApp Custom Resource Definition
//!
//! A SimpleApp declares a container image and a replica count. The operator
//! backs each SimpleApp with one ClusterIP Service and one Deployment.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a SimpleApp
///
/// Identity (name, namespace, uid) comes from object metadata, not from the spec.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "simpleapp.dev",
    version = "v1",
    kind = "SimpleApp",
    plural = "simpleapps",
    singular = "simpleapp",
    shortname = "simple-app",
    namespaced,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SimpleAppSpec {
    /// Container image reference (e.g., "nginx:latest")
    #[schemars(length(min = 1))]
    pub image: String,

    /// Desired replica count; the Deployment default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub replicas: Option<i32>,
}

impl SimpleAppSpec {
    /// Create a spec for the given image with an explicit replica count
    pub fn new(image: impl Into<String>, replicas: Option<i32>) -> Self {
        Self {
            image: image.into(),
            replicas,
        }
    }
}
