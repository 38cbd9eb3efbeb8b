//! SimpleApp create/delete handlers
//!
//! Both paths are straight-line: every client error is returned as-is, nothing
//! is retried and nothing is rolled back. A Service created before a failed
//! Deployment stays behind; the owner reference lets garbage collection take it
//! once the SimpleApp itself is gone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::client::{Cascade, ClusterClient};
use crate::dispatch::{LifecycleEvent, LifecycleHandler};
use crate::workload::{build_deployment, build_service, deployment_name, service_name};
use crate::Error;

/// Lifecycle handler that provisions and tears down a SimpleApp's backing objects
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
}

impl Reconciler {
    /// Create a reconciler using the given cluster client
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LifecycleHandler for Reconciler {
    async fn on_create(&self, event: &LifecycleEvent) -> Result<(), Error> {
        let LifecycleEvent {
            name,
            namespace,
            spec,
            owner,
        } = event;
        info!(app = %name, namespace = %namespace, "creating simple-app");

        let service = build_service(name, namespace, owner.as_ref());
        let status = self.client.create_service(namespace, &service).await?;
        info!(app = %name, status = %status, "service created");

        let deployment = build_deployment(name, namespace, spec, owner.as_ref());
        let status = self.client.create_deployment(namespace, &deployment).await?;
        info!(app = %name, status = %status, "deployment created");

        info!(app = %name, namespace = %namespace, "simple-app created");
        Ok(())
    }

    async fn on_delete(&self, event: &LifecycleEvent) -> Result<(), Error> {
        let name = &event.name;
        let namespace = &event.namespace;
        info!(app = %name, namespace = %namespace, "deleting simple-app");

        let status = self
            .client
            .delete_deployment(namespace, &deployment_name(name), Cascade::Foreground)
            .await?;
        info!(app = %name, status = %status, "deployment deleted");

        let status = self
            .client
            .delete_service(namespace, &service_name(name))
            .await?;
        info!(app = %name, status = %status, "service deleted");

        info!(app = %name, namespace = %namespace, "simple-app deleted");
        Ok(())
    }
}
