//! Error types for the simple-app operator

use thiserror::Error;

/// Main error type for simple-app operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An object with the derived name already exists (HTTP 409)
    #[error("conflict: {kind} '{name}' already exists")]
    Conflict {
        /// Kind of the object being created (e.g., "Service")
        kind: String,
        /// Name of the conflicting object
        name: String,
    },

    /// The object to delete does not exist (HTTP 404)
    #[error("not found: {kind} '{name}'")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// Malformed custom resource or an object the API server rejected as invalid
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other Kubernetes API or transport failure
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Classify a kube-rs error returned while operating on `kind`/`name`
    ///
    /// 409 becomes [`Error::Conflict`], 404 becomes [`Error::NotFound`], and
    /// 400/422 become [`Error::Validation`] carrying the API server's message.
    /// Everything else is kept as [`Error::Kube`].
    pub fn from_kube(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(ae) if ae.code == 400 || ae.code == 422 => {
                Self::Validation(format!("{kind} '{name}': {}", ae.message))
            }
            other => Self::Kube(other),
        }
    }

    /// Whether requeueing the triggering event could succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Serialization(_))
    }
}
