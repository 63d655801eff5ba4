//! Typed control-plane client.

use std::sync::Arc;

use async_trait::async_trait;
use runwarden_types::{LabelSelector, Object, ObjectKey};
use tokio::sync::mpsc;

use crate::error::Result;

/// Filters for list, watch and delete-collection requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Restrict to one namespace; `None` means all namespaces.
    pub namespace: Option<String>,
    /// Restrict to objects whose labels match.
    pub selector: LabelSelector,
}

impl ListParams {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Restrict by label selector.
    pub fn with_selector(mut self, selector: LabelSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Whether an object passes these filters.
    pub fn matches<O: Object>(&self, obj: &O) -> bool {
        let meta = obj.meta();
        self.namespace
            .as_deref()
            .is_none_or(|ns| ns == meta.namespace)
            && self.selector.matches(&meta.labels)
    }
}

/// A change observed on a watch.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<O> {
    Added(O),
    Modified(O),
    /// Carries the last known state of the deleted object.
    Deleted(O),
}

impl<O: Object> WatchEvent<O> {
    /// The object the event refers to.
    pub fn object(&self) -> &O {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
        }
    }
}

/// Stream of watch events.
///
/// Ends with `None` when the server closes the watch, or yields an error
/// (typically [`ClusterError::WatchExpired`](crate::ClusterError::WatchExpired))
/// when the watcher must relist.
pub struct Watch<O> {
    rx: mpsc::Receiver<Result<WatchEvent<O>>>,
}

impl<O> Watch<O> {
    /// Wrap the receiving half of an event channel.
    pub fn new(rx: mpsc::Receiver<Result<WatchEvent<O>>>) -> Self {
        Self { rx }
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> Option<Result<WatchEvent<O>>> {
        self.rx.recv().await
    }
}

/// Typed client for one resource kind.
#[async_trait]
pub trait ResourceClient<O: Object>: Send + Sync {
    /// Fetch one object.
    async fn get(&self, key: &ObjectKey) -> Result<O>;

    /// List objects matching `params`.
    async fn list(&self, params: &ListParams) -> Result<Vec<O>>;

    /// Create a new object.
    async fn create(&self, obj: O) -> Result<O>;

    /// Replace an existing object's spec and metadata.
    ///
    /// A non-zero `resource_version` must match the stored one.
    async fn update(&self, obj: O) -> Result<O>;

    /// Replace only the status of an existing object.
    async fn update_status(&self, obj: O) -> Result<O>;

    /// Delete one object.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// Delete every object matching `params`, returning how many were removed.
    async fn delete_collection(&self, params: &ListParams) -> Result<usize>;

    /// Apply a JSON merge patch to an object.
    async fn patch(&self, key: &ObjectKey, patch: serde_json::Value) -> Result<O>;

    /// Watch for changes to objects matching `params`.
    async fn watch(&self, params: &ListParams) -> Result<Watch<O>>;
}

/// Shared handle to a client.
pub type SharedClient<O> = Arc<dyn ResourceClient<O>>;

#[cfg(test)]
mod tests {
    use super::*;
    use runwarden_types::{ObjectMeta, Pod};

    #[test]
    fn test_list_params_matching() {
        let pod = Pod::new(ObjectMeta::new("ci", "p1").with_label("app", "web"));

        assert!(ListParams::all().matches(&pod));
        assert!(ListParams::all().in_namespace("ci").matches(&pod));
        assert!(!ListParams::all().in_namespace("prod").matches(&pod));

        let selector = LabelSelector::new().with_requirement("app", "web");
        assert!(ListParams::all().with_selector(selector).matches(&pod));

        let selector = LabelSelector::new().with_requirement("app", "db");
        assert!(!ListParams::all().with_selector(selector).matches(&pod));
    }
}
