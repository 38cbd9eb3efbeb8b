//! Cluster API client used by the reconciler
//!
//! The four operations here are the only way the reconciler touches the
//! cluster. They map kube-rs errors into [`Error`] but never retry.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{Error, FIELD_MANAGER};

/// Returned when a delete was accepted but the object still exists
/// (e.g., foreground deletion waiting on dependents)
pub const STATUS_DELETING: &str = "Deleting";

/// Returned when the object was removed immediately
pub const STATUS_DELETED: &str = "Deleted";

/// Cascade policy for deletions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cascade {
    /// Dependents are removed before the owner is reported deleted
    Foreground,
    /// Owner is removed immediately, dependents are collected afterwards
    Background,
    /// Dependents are left behind
    Orphan,
}

impl From<Cascade> for PropagationPolicy {
    fn from(cascade: Cascade) -> Self {
        match cascade {
            Cascade::Foreground => PropagationPolicy::Foreground,
            Cascade::Background => PropagationPolicy::Background,
            Cascade::Orphan => PropagationPolicy::Orphan,
        }
    }
}

/// Trait abstracting the Kubernetes operations the reconciler performs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. Each call returns a short status string
/// for logging.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create a Service in `namespace`
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<String, Error>;

    /// Delete the Service `name` in `namespace`
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<String, Error>;

    /// Create a Deployment in `namespace`
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<String, Error>;

    /// Delete the Deployment `name` in `namespace` with the given cascade policy
    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
        cascade: Cascade,
    ) -> Result<String, Error>;
}

/// Real Kubernetes client implementation
pub struct ClusterClientImpl {
    client: Client,
}

impl ClusterClientImpl {
    /// Create a new ClusterClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClusterClient for ClusterClientImpl {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<String, Error> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        let created = api
            .create(&Self::post_params(), service)
            .await
            .map_err(|e| Error::from_kube("Service", &name, e))?;

        debug!(service = %name, namespace = %namespace, "service accepted by API server");
        Ok(format!("{:?}", created.status))
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<String, Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        let outcome = api
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::from_kube("Service", name, e))?;

        Ok(outcome.either(
            |_| STATUS_DELETING.to_string(),
            |_| STATUS_DELETED.to_string(),
        ))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<String, Error> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        let created = api
            .create(&Self::post_params(), deployment)
            .await
            .map_err(|e| Error::from_kube("Deployment", &name, e))?;

        debug!(deployment = %name, namespace = %namespace, "deployment accepted by API server");
        Ok(format!("{:?}", created.status))
    }

    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
        cascade: Cascade,
    ) -> Result<String, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            propagation_policy: Some(cascade.into()),
            ..Default::default()
        };

        let outcome = api
            .delete(name, &params)
            .await
            .map_err(|e| Error::from_kube("Deployment", name, e))?;

        Ok(outcome.either(
            |_| STATUS_DELETING.to_string(),
            |_| STATUS_DELETED.to_string(),
        ))
    }
}
