//! Object keys.
//!
//! A [`WorkKey`] is the opaque string that travels through the event queue.
//! An [`ObjectKey`] is its parsed `namespace/name` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Opaque queue element identifying a cluster object (`namespace/name`).
///
/// Equality is string equality. Cluster-scoped objects are keyed by bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkKey(String);

impl WorkKey {
    /// Wrap a raw key string without validating it.
    ///
    /// Validation is deferred to [`WorkKey::parse`] so malformed keys can be
    /// detected (and dropped) where they are consumed.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key back into its namespace and name.
    pub fn parse(&self) -> Result<ObjectKey, KeyError> {
        self.0.parse()
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ObjectKey> for WorkKey {
    fn from(key: &ObjectKey) -> Self {
        Self(key.to_string())
    }
}

impl From<ObjectKey> for WorkKey {
    fn from(key: ObjectKey) -> Self {
        Self::from(&key)
    }
}

/// Parsed `namespace/name` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace; empty for cluster-scoped objects.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Create a key from its parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for ObjectKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }

        let mut parts = s.split('/');
        let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => ("", name),
            (Some(namespace), Some(name), None) => (namespace, name),
            _ => return Err(KeyError::Format(s.to_string())),
        };

        if name.is_empty() {
            return Err(KeyError::EmptyName(s.to_string()));
        }

        Ok(Self::new(namespace, name))
    }
}
