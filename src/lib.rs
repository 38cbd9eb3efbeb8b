//! simple-app-operator - backs `SimpleApp` custom resources with a Service and a Deployment
//!
//! For every `SimpleApp` the operator creates a ClusterIP Service and a
//! single-container Deployment when the resource first appears, and deletes
//! both when the resource is deleted. There is no update handling: editing a
//! SimpleApp after creation has no effect until it is recreated.
//!
//! # Architecture
//!
//! ```text
//! watch (kube::runtime::Controller)
//!   -> dispatch::reconcile          picks create / delete / nothing
//!     -> controller::Reconciler     on_create / on_delete
//!       -> controller::ClusterClient   create/delete Service and Deployment
//! ```
//!
//! # Modules
//!
//! - [`crd`] - The `SimpleApp` Custom Resource Definition
//! - [`dispatch`] - Watch loop, lifecycle event selection, finalizers, retry policy
//! - [`controller`] - Create/delete handlers and the cluster client they call
//! - [`workload`] - Pure builders for the Service and Deployment
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod dispatch;
pub mod error;
pub mod telemetry;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Constants
// =============================================================================

/// Name the operator uses for itself in labels and field managers
pub const OPERATOR_NAME: &str = "simple-app-operator";

/// Field manager recorded on every write the operator makes
pub const FIELD_MANAGER: &str = OPERATOR_NAME;

/// Finalizer marking a SimpleApp whose backing objects were created
pub const FINALIZER: &str = "simpleapp.dev/cleanup";

/// Label key linking pods and Services to their SimpleApp
pub const APP_LABEL: &str = "simple-app";

/// Standard label identifying the managing controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
