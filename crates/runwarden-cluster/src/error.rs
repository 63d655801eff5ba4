//! Error types for control-plane operations.

use thiserror::Error;

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors returned by a [`ResourceClient`](crate::ResourceClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The object does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// An object with the same key already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    /// The write was based on a stale resource version.
    #[error("conflict writing {kind} {key}: {reason}")]
    Conflict {
        kind: &'static str,
        key: String,
        reason: String,
    },

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The control plane could not be reached.
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The watch fell behind and must be re-established from a fresh list.
    #[error("watch expired: {0}")]
    WatchExpired(String),
}

impl ClusterError {
    /// Whether the error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClusterError::Conflict { .. } | ClusterError::Unavailable(_) | ClusterError::WatchExpired(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = ClusterError::NotFound {
            kind: "WorkflowRun",
            key: "ci/r1".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        assert!(ClusterError::Unavailable("etcd".into()).is_transient());
        assert!(!ClusterError::Invalid("bad".into()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = ClusterError::AlreadyExists {
            kind: "Pod",
            key: "ci/p".into(),
        };
        assert_eq!(err.to_string(), "Pod ci/p already exists");
    }
}
