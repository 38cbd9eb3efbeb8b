//! Handler stories against a real API server
//!
//! The create and delete handlers are driven directly here, without the watch
//! loop, to show exactly what they do to the cluster.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};

use simple_app_operator::controller::{ClusterClientImpl, Reconciler};
use simple_app_operator::crd::SimpleAppSpec;
use simple_app_operator::dispatch::{LifecycleEvent, LifecycleHandler};
use simple_app_operator::Error;

use super::helpers::{create_namespace, delete_namespace, ensure_test_cluster, wait_for, CONVERGE_TIMEOUT};

fn reconciler(client: &Client) -> Reconciler {
    Reconciler::new(Arc::new(ClusterClientImpl::new(client.clone())))
}

/// Story: A team creates a web app and gets a Service and a Deployment
///
/// Expected behavior:
/// - `web-simple-service` exposes port 80 and targets 8080 on `simple-app=web` pods
/// - `web-simple-deployment` runs three replicas of the requested image
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_create_handler_provisions_service_and_deployment() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let ns = "simple-app-handlers-create";
    create_namespace(&client, ns).await;

    let event = LifecycleEvent::new("web", ns, SimpleAppSpec::new("nginx:latest", Some(3)));
    reconciler(&client)
        .on_create(&event)
        .await
        .expect("create handler failed");

    let services: Api<Service> = Api::namespaced(client.clone(), ns);
    let service = services
        .get("web-simple-service")
        .await
        .expect("service should exist");
    let spec = service.spec.expect("service spec");
    assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
    let port = &spec.ports.expect("service ports")[0];
    assert_eq!(port.port, 80);
    assert_eq!(
        port.target_port,
        Some(k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(8080))
    );
    assert_eq!(
        spec.selector.expect("selector").get("simple-app").map(String::as_str),
        Some("web")
    );

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    let deployment = deployments
        .get("web-simple-deployment")
        .await
        .expect("deployment should exist");
    let spec = deployment.spec.expect("deployment spec");
    assert_eq!(spec.replicas, Some(3));
    let container = &spec.template.spec.expect("pod spec").containers[0];
    assert_eq!(container.name, "web-simple-container");
    assert_eq!(container.image.as_deref(), Some("nginx:latest"));

    delete_namespace(&client, ns).await;
}

/// Story: Creating the same app twice is rejected by the cluster
///
/// The handler does not create-or-update; the second attempt surfaces the
/// API server's conflict as-is.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_second_create_surfaces_conflict() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let ns = "simple-app-handlers-conflict";
    create_namespace(&client, ns).await;

    let event = LifecycleEvent::new("api", ns, SimpleAppSpec::new("httpd:2.4", None));
    let handler = reconciler(&client);
    handler.on_create(&event).await.expect("first create failed");

    let err = handler
        .on_create(&event)
        .await
        .expect_err("second create should conflict");
    assert!(matches!(err, Error::Conflict { .. }), "got {err:?}");

    delete_namespace(&client, ns).await;
}

/// Story: Deleting an app removes both backing objects
///
/// Expected behavior:
/// - The Deployment is deleted with foreground propagation, then the Service
/// - Neither object can be read once the API server finishes
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_delete_handler_removes_service_and_deployment() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let ns = "simple-app-handlers-delete";
    create_namespace(&client, ns).await;

    let event = LifecycleEvent::new("web", ns, SimpleAppSpec::new("nginx:latest", Some(1)));
    let handler = reconciler(&client);
    handler.on_create(&event).await.expect("create handler failed");
    handler.on_delete(&event).await.expect("delete handler failed");

    let services: Api<Service> = Api::namespaced(client.clone(), ns);
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    wait_for(CONVERGE_TIMEOUT, || {
        let services = services.clone();
        let deployments = deployments.clone();
        async move {
            services.get_opt("web-simple-service").await.ok().flatten().is_none()
                && deployments
                    .get_opt("web-simple-deployment")
                    .await
                    .ok()
                    .flatten()
                    .is_none()
        }
    })
    .await
    .expect("backing objects should be gone");

    // Nothing left to delete: the handler reports it instead of succeeding
    let err = handler
        .on_delete(&event)
        .await
        .expect_err("second delete should fail");
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    delete_namespace(&client, ns).await;
}
