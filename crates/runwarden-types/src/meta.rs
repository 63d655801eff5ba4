//! Object metadata shared by every resource kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::ObjectKey;

/// Metadata carried by every cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique within its namespace.
    pub name: String,
    /// Namespace; empty for cluster-scoped objects.
    #[serde(default)]
    pub namespace: String,
    /// Arbitrary labels used for selection.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// When the object was first persisted.
    #[serde(default = "Utc::now")]
    pub creation_timestamp: DateTime<Utc>,
    /// Monotonic version assigned by the store on every write.
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// Create metadata for a new object, stamped with the current time.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            creation_timestamp: Utc::now(),
            resource_version: 0,
        }
    }

    /// Set the creation timestamp.
    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = ts;
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// The `namespace/name` key of this object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}
