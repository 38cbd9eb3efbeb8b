//! Custom Resource Definitions for the simple-app operator
//!
//! This module contains the `SimpleApp` CRD watched by the dispatcher.

mod simple_app;

use kube::CustomResourceExt;

pub use simple_app::{SimpleApp, SimpleAppSpec};

/// Render the SimpleApp CRD as a YAML manifest
pub fn render_crd() -> Result<String, crate::Error> {
    serde_yaml::to_string(&SimpleApp::crd())
        .map_err(|e| crate::Error::serialization(format!("SimpleApp CRD: {e}")))
}
