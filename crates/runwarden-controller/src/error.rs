//! Error types for the controller.

use runwarden_cluster::ClusterError;
use runwarden_types::KeyError;
use thiserror::Error;

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors surfaced by reconcile handlers.
///
/// Every variant except [`ControllerError::MalformedKey`] makes the key
/// eligible for a rate-limited retry.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A call against the cluster failed.
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// A queued key could not be parsed back into `namespace/name`.
    #[error("Malformed key: {0}")]
    MalformedKey(#[from] KeyError),

    /// Handler-specific failure, including a panicking handler.
    #[error("Handler failed: {0}")]
    Handler(String),
}

impl ControllerError {
    /// Create a handler error.
    pub fn handler(message: impl Into<String>) -> Self {
        ControllerError::Handler(message.into())
    }

    /// Whether the key should be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ControllerError::MalformedKey(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_not_retryable() {
        let err = ControllerError::from(KeyError::Empty);
        assert!(!err.is_retryable());
        assert!(ControllerError::handler("boom").is_retryable());
        let cluster = ControllerError::from(ClusterError::Unavailable("down".into()));
        assert!(cluster.is_retryable());
        assert!(cluster.to_string().contains("down"));
    }
}
