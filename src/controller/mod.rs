//! Reconciler for SimpleApp resources
//!
//! The reconciler is the [`crate::dispatch::LifecycleHandler`] registered with
//! the dispatcher. It composes [`ClusterClient`] calls to create or delete the
//! Service and Deployment backing a SimpleApp.

mod client;
mod reconciler;

pub use client::{ClusterClient, ClusterClientImpl, Cascade, STATUS_DELETED, STATUS_DELETING};
pub use reconciler::Reconciler;

#[cfg(test)]
pub use client::MockClusterClient;
