//! Error types for key parsing.

use thiserror::Error;

/// A work key that cannot be split back into `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key was empty.
    #[error("empty key")]
    Empty,

    /// The key had more than one `/` separator.
    #[error("unexpected key format: {0:?}")]
    Format(String),

    /// The name component was empty.
    #[error("key has an empty name: {0:?}")]
    EmptyName(String),
}

