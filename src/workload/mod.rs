//! Workload builders for SimpleApp resources
//!
//! Pure functions mapping a SimpleApp's identity and spec to the two objects
//! that back it:
//! - Service: ClusterIP endpoint, port 80 -> container port 8080
//! - Deployment: one pod template running a single container
//!
//! Names are deterministic functions of the SimpleApp name, so the delete path
//! can address the objects without reading anything back from the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::SimpleAppSpec;
use crate::{APP_LABEL, MANAGED_BY_LABEL, OPERATOR_NAME};

/// Port exposed by the Service
pub const SERVICE_PORT: i32 = 80;

/// Container port the Service routes to
pub const TARGET_PORT: i32 = 8080;

/// Service type for every generated Service
pub const SERVICE_TYPE: &str = "ClusterIP";

// =============================================================================
// Naming
// =============================================================================

/// Name of the Service backing a SimpleApp
pub fn service_name(app: &str) -> String {
    format!("{app}-simple-service")
}

/// Name of the Deployment backing a SimpleApp
pub fn deployment_name(app: &str) -> String {
    format!("{app}-simple-deployment")
}

/// Name of the single container in the Deployment's pod template
pub fn container_name(app: &str) -> String {
    format!("{app}-simple-container")
}

/// Labels linking pods to their SimpleApp: `{simple-app: <app>}`
///
/// Used both as the Service selector and as the Deployment selector / pod labels.
pub fn selector_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app.to_string())])
}

fn object_meta(name: String, namespace: &str, owner: Option<&OwnerReference>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            OPERATOR_NAME.to_string(),
        )])),
        owner_references: owner.map(|o| vec![o.clone()]),
        ..Default::default()
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Build the ClusterIP Service for a SimpleApp
pub fn build_service(app: &str, namespace: &str, owner: Option<&OwnerReference>) -> Service {
    Service {
        metadata: object_meta(service_name(app), namespace, owner),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(app)),
            ports: Some(vec![ServicePort {
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(TARGET_PORT)),
                ..Default::default()
            }]),
            type_: Some(SERVICE_TYPE.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Deployment for a SimpleApp
///
/// `spec.replicas` is copied as-is. When absent the field is left unset and the
/// API server applies its own default.
pub fn build_deployment(
    app: &str,
    namespace: &str,
    spec: &SimpleAppSpec,
    owner: Option<&OwnerReference>,
) -> Deployment {
    let container = Container {
        name: container_name(app),
        image: Some(spec.image.clone()),
        ..Default::default()
    };

    Deployment {
        metadata: object_meta(deployment_name(app), namespace, owner),
        spec: Some(DeploymentSpec {
            replicas: spec.replicas,
            selector: LabelSelector {
                match_labels: Some(selector_labels(app)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector_labels(app)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
