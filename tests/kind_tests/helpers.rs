//! Shared setup for the kind integration tests

use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client, CustomResourceExt};

use simple_app_operator::crd::SimpleApp;
use simple_app_operator::FIELD_MANAGER;

/// How long a story waits for the cluster to converge
pub const CONVERGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect to the test cluster and make sure the SimpleApp CRD is installed
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let client = Client::try_default()
        .await
        .map_err(|e| format!("failed to connect to cluster: {e}"))?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        SimpleApp::crd_name(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&SimpleApp::crd()),
    )
    .await
    .map_err(|e| format!("failed to install CRD: {e}"))?;

    // The API server needs a moment before the new resource is served
    let apps: Api<SimpleApp> = Api::all(client.clone());
    wait_for(CONVERGE_TIMEOUT, || {
        let apps = apps.clone();
        async move { apps.list(&ListParams::default()).await.is_ok() }
    })
    .await?;

    Ok(client)
}

/// Create a fresh namespace for one story
pub async fn create_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    delete_namespace(client, name).await;

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    // A previous run may still be terminating the namespace
    let _ = wait_for(CONVERGE_TIMEOUT, || {
        let api = api.clone();
        let ns = ns.clone();
        async move { api.create(&PostParams::default(), &ns).await.is_ok() }
    })
    .await;
}

/// Delete a story's namespace, ignoring errors
pub async fn delete_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Poll `check` once a second until it returns true or `timeout` elapses
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("condition not met within {timeout:?}"));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
