//! Event dispatcher for SimpleApp resources
//!
//! Watches SimpleApp objects with `kube::runtime::Controller` and turns each
//! observed object into at most one lifecycle event for the registered
//! [`LifecycleHandler`]:
//!
//! - first sighting (no finalizer, not deleting) -> `on_create`
//! - deletion requested while our finalizer is present -> `on_delete`
//! - anything else -> nothing (there is no update event)
//!
//! The finalizer is the record that `on_create` completed. It is added only
//! after `on_create` succeeds and removed only after `on_delete` succeeds, so a
//! SimpleApp cannot disappear before its backing objects are torn down.
//!
//! Handlers never retry. Whether an event is retried is decided here, by
//! [`error_policy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Config as ControllerConfig};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument};

#[cfg(test)]
use mockall::automock;

use crate::crd::{SimpleApp, SimpleAppSpec};
use crate::{Error, FIELD_MANAGER, FINALIZER};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Default delay before a failed event is delivered again
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

// =============================================================================
// Events and handlers
// =============================================================================

/// Snapshot of a SimpleApp delivered to a handler
#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleEvent {
    /// SimpleApp name
    pub name: String,
    /// SimpleApp namespace
    pub namespace: String,
    /// Declared spec at the time of the event
    pub spec: SimpleAppSpec,
    /// Controller owner reference pointing back at the SimpleApp
    pub owner: Option<OwnerReference>,
}

impl LifecycleEvent {
    /// Create an event without an owner reference
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, spec: SimpleAppSpec) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            spec,
            owner: None,
        }
    }

    /// Attach an owner reference
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Build an event from an observed SimpleApp
    ///
    /// The owner reference is only present once the API server has assigned a UID.
    pub fn from_resource(app: &SimpleApp) -> Result<Self, Error> {
        let name = app.name_any();
        let namespace = app
            .namespace()
            .ok_or_else(|| Error::validation(format!("SimpleApp '{name}' has no namespace")))?;

        Ok(Self {
            owner: app.controller_owner_ref(&()),
            spec: app.spec.clone(),
            name,
            namespace,
        })
    }
}

/// Handlers invoked by the dispatcher
///
/// Errors are returned unmodified to the dispatcher; implementations must not
/// retry on their own.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Called once when a SimpleApp is first observed
    async fn on_create(&self, event: &LifecycleEvent) -> Result<(), Error>;

    /// Called once when deletion of a created SimpleApp is requested
    async fn on_delete(&self, event: &LifecycleEvent) -> Result<(), Error>;
}

// =============================================================================
// Finalizer bookkeeping
// =============================================================================

/// Trait abstracting finalizer updates on SimpleApp objects
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FinalizerClient: Send + Sync {
    /// Add the operator finalizer to a SimpleApp
    async fn add_finalizer(&self, name: &str, namespace: &str) -> Result<(), Error>;

    /// Remove the operator finalizer from a SimpleApp
    async fn remove_finalizer(&self, name: &str, namespace: &str) -> Result<(), Error>;
}

/// Real finalizer client using JSON merge patches
pub struct FinalizerClientImpl {
    client: Client,
}

impl FinalizerClientImpl {
    /// Create a new FinalizerClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn patch_finalizers(
        &self,
        api: &Api<SimpleApp>,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from_kube("SimpleApp", name, e))?;
        Ok(())
    }
}

#[async_trait]
impl FinalizerClient for FinalizerClientImpl {
    async fn add_finalizer(&self, name: &str, namespace: &str) -> Result<(), Error> {
        let api: Api<SimpleApp> = Api::namespaced(self.client.clone(), namespace);

        // Read the current list so finalizers owned by others are preserved
        let app = api
            .get(name)
            .await
            .map_err(|e| Error::from_kube("SimpleApp", name, e))?;
        let mut finalizers = app.finalizers().to_vec();

        if finalizers.iter().any(|f| f == FINALIZER) {
            debug!(app = %name, "finalizer already present");
            return Ok(());
        }
        finalizers.push(FINALIZER.to_string());

        self.patch_finalizers(&api, name, finalizers).await
    }

    async fn remove_finalizer(&self, name: &str, namespace: &str) -> Result<(), Error> {
        let api: Api<SimpleApp> = Api::namespaced(self.client.clone(), namespace);

        let app = match api.get(name).await {
            Ok(app) => app,
            // Already gone: nothing left to release
            Err(kube::Error::Api(ae)) if ae.code == 404 => return Ok(()),
            Err(e) => return Err(Error::from_kube("SimpleApp", name, e)),
        };
        let finalizers: Vec<String> = app
            .finalizers()
            .iter()
            .filter(|f| *f != FINALIZER)
            .cloned()
            .collect();

        self.patch_finalizers(&api, name, finalizers).await
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Lifecycle step implied by an observed SimpleApp
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Backing objects must be created
    Create,
    /// Backing objects must be deleted
    Delete,
    /// Nothing to do
    NoOp,
}

/// Decide which lifecycle event an observed SimpleApp represents
pub fn determine_action(app: &SimpleApp) -> LifecycleAction {
    let deleting = app.meta().deletion_timestamp.is_some();
    let created = app.finalizers().iter().any(|f| f == FINALIZER);

    match (deleting, created) {
        (true, true) => LifecycleAction::Delete,
        // create never completed, nothing of ours to tear down
        (true, false) => LifecycleAction::NoOp,
        (false, false) => LifecycleAction::Create,
        // already created; spec changes are not acted on
        (false, true) => LifecycleAction::NoOp,
    }
}

/// Shared context for the dispatcher's reconcile loop
pub struct Context {
    /// Registered lifecycle handler
    pub handler: Arc<dyn LifecycleHandler>,
    /// Finalizer bookkeeping (trait object for testability)
    pub finalizers: Arc<dyn FinalizerClient>,
    /// Delay before a retryable failure is delivered again
    pub retry_backoff: Duration,
}

impl Context {
    /// Create a new context
    pub fn new(
        handler: Arc<dyn LifecycleHandler>,
        finalizers: Arc<dyn FinalizerClient>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            handler,
            finalizers,
            retry_backoff,
        }
    }
}

/// Reconcile a SimpleApp by dispatching at most one lifecycle event
#[instrument(skip(app, ctx), fields(app = %app.name_any(), namespace = ?app.namespace()))]
pub async fn reconcile(app: Arc<SimpleApp>, ctx: Arc<Context>) -> Result<Action, Error> {
    let action = determine_action(&app);
    debug!(?action, "dispatching lifecycle event");

    match action {
        LifecycleAction::Create => {
            let event = LifecycleEvent::from_resource(&app)?;
            ctx.handler.on_create(&event).await?;
            ctx.finalizers
                .add_finalizer(&event.name, &event.namespace)
                .await?;
        }
        LifecycleAction::Delete => {
            let event = LifecycleEvent::from_resource(&app)?;
            ctx.handler.on_delete(&event).await?;
            ctx.finalizers
                .remove_finalizer(&event.name, &event.namespace)
                .await?;
        }
        LifecycleAction::NoOp => {}
    }

    Ok(Action::await_change())
}

/// Error policy for SimpleApp events
///
/// Validation failures wait for the user to change the resource; everything
/// else is delivered again after the configured backoff.
pub fn error_policy(app: Arc<SimpleApp>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        app = %app.name_any(),
        retryable = error.is_retryable(),
        "lifecycle handler failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.retry_backoff)
    } else {
        Action::await_change()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Dispatcher configuration
#[derive(Clone, Debug, PartialEq)]
pub struct DispatcherConfig {
    /// Watch a single namespace instead of the whole cluster
    pub namespace: Option<String>,
    /// Delay before a retryable failure is delivered again
    pub retry_backoff: Duration,
    /// Maximum number of SimpleApps handled at once (1 = strictly one event at a time)
    pub concurrency: u16,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            concurrency: 1,
        }
    }
}

/// Watches SimpleApp objects and delivers lifecycle events to a registered handler
pub struct Dispatcher {
    client: Client,
    config: DispatcherConfig,
    handler: Arc<dyn LifecycleHandler>,
}

impl Dispatcher {
    /// Create a dispatcher delivering events to `handler`
    pub fn new(client: Client, config: DispatcherConfig, handler: Arc<dyn LifecycleHandler>) -> Self {
        Self {
            client,
            config,
            handler,
        }
    }

    /// Run until a shutdown signal is received
    pub async fn run(self) {
        let api: Api<SimpleApp> = match &self.config.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let ctx = Arc::new(Context::new(
            self.handler,
            Arc::new(FinalizerClientImpl::new(self.client)),
            self.config.retry_backoff,
        ));

        info!(
            namespace = self.config.namespace.as_deref().unwrap_or("*"),
            concurrency = self.config.concurrency,
            "watching SimpleApp resources"
        );

        Controller::new(api, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .with_config(ControllerConfig::default().concurrency(self.config.concurrency))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("SimpleApp"))
            .await;

        info!("dispatcher stopped");
    }
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
