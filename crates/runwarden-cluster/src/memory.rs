//! Process-local control plane.
//!
//! [`InMemoryClient`] keeps objects in a map, assigns resource versions on
//! every write and broadcasts changes to watchers. It backs the test suites
//! and the binary's local mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use runwarden_types::{Object, ObjectKey};
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::trace;

use crate::client::{ListParams, ResourceClient, Watch, WatchEvent};
use crate::error::{ClusterError, Result};

/// Events buffered per kind before slow watchers are expired.
const EVENT_BUFFER: usize = 1024;

/// Events buffered per individual watch.
const WATCH_BUFFER: usize = 256;

/// In-memory [`ResourceClient`] for one resource kind.
pub struct InMemoryClient<O: Object> {
    objects: RwLock<BTreeMap<ObjectKey, O>>,
    version: AtomicU64,
    events: broadcast::Sender<WatchEvent<O>>,
    injected: Mutex<Option<ClusterError>>,
}

impl<O: Object> Default for InMemoryClient<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Object> InMemoryClient<O> {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            objects: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            events,
            injected: Mutex::new(None),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Whether an object with `key` exists.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Make the next request fail with `err`.
    pub fn fail_next(&self, err: ClusterError) {
        *self.injected.lock() = Some(err);
    }

    fn take_injected(&self) -> Result<()> {
        match self.injected.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn not_found(key: &ObjectKey) -> ClusterError {
        ClusterError::NotFound {
            kind: O::KIND,
            key: key.to_string(),
        }
    }

    fn publish(&self, event: WatchEvent<O>) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }

    fn check_version(stored: &O, incoming: &O) -> Result<()> {
        let incoming_version = incoming.meta().resource_version;
        if incoming_version != 0 && incoming_version != stored.meta().resource_version {
            return Err(ClusterError::Conflict {
                kind: O::KIND,
                key: stored.key().to_string(),
                reason: format!(
                    "resource version {} is stale (current {})",
                    incoming_version,
                    stored.meta().resource_version
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<O: Object> ResourceClient<O> for InMemoryClient<O> {
    async fn get(&self, key: &ObjectKey) -> Result<O> {
        self.take_injected()?;
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Self::not_found(key))
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<O>> {
        self.take_injected()?;
        Ok(self
            .objects
            .read()
            .values()
            .filter(|o| params.matches(*o))
            .cloned()
            .collect())
    }

    async fn create(&self, mut obj: O) -> Result<O> {
        self.take_injected()?;
        let key = obj.key();
        if key.name.is_empty() {
            return Err(ClusterError::Invalid(format!("{} without a name", O::KIND)));
        }

        let mut objects = self.objects.write();
        if objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: O::KIND,
                key: key.to_string(),
            });
        }

        obj.meta_mut().resource_version = self.next_version();
        objects.insert(key.clone(), obj.clone());
        self.publish(WatchEvent::Added(obj.clone()));
        trace!(kind = O::KIND, key = %key, "Object created");
        Ok(obj)
    }

    async fn update(&self, mut obj: O) -> Result<O> {
        self.take_injected()?;
        let key = obj.key();
        let mut objects = self.objects.write();
        let stored = objects.get_mut(&key).ok_or_else(|| Self::not_found(&key))?;
        Self::check_version(stored, &obj)?;

        // Status is owned by update_status.
        obj.copy_status_from(stored);
        obj.meta_mut().creation_timestamp = stored.meta().creation_timestamp;
        obj.meta_mut().resource_version = self.next_version();
        *stored = obj.clone();
        self.publish(WatchEvent::Modified(obj.clone()));
        Ok(obj)
    }

    async fn update_status(&self, obj: O) -> Result<O> {
        self.take_injected()?;
        let key = obj.key();
        let mut objects = self.objects.write();
        let stored = objects.get_mut(&key).ok_or_else(|| Self::not_found(&key))?;
        Self::check_version(stored, &obj)?;

        stored.copy_status_from(&obj);
        stored.meta_mut().resource_version = self.next_version();
        let updated = stored.clone();
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.take_injected()?;
        let removed = self
            .objects
            .write()
            .remove(key)
            .ok_or_else(|| Self::not_found(key))?;
        self.publish(WatchEvent::Deleted(removed));
        trace!(kind = O::KIND, key = %key, "Object deleted");
        Ok(())
    }

    async fn delete_collection(&self, params: &ListParams) -> Result<usize> {
        self.take_injected()?;
        let mut objects = self.objects.write();
        let doomed: Vec<ObjectKey> = objects
            .iter()
            .filter(|(_, o)| params.matches(*o))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &doomed {
            if let Some(removed) = objects.remove(key) {
                self.publish(WatchEvent::Deleted(removed));
            }
        }
        Ok(doomed.len())
    }

    async fn patch(&self, key: &ObjectKey, patch: Value) -> Result<O> {
        self.take_injected()?;
        let mut objects = self.objects.write();
        let stored = objects.get_mut(key).ok_or_else(|| Self::not_found(key))?;

        let mut doc = serde_json::to_value(&*stored)
            .map_err(|e| ClusterError::Invalid(format!("cannot encode {}: {}", O::KIND, e)))?;
        merge_patch(&mut doc, &patch);
        let mut patched: O = serde_json::from_value(doc)
            .map_err(|e| ClusterError::Invalid(format!("patch produced invalid {}: {}", O::KIND, e)))?;

        if patched.key() != *key {
            return Err(ClusterError::Invalid("patch may not change name or namespace".into()));
        }

        patched.meta_mut().resource_version = self.next_version();
        *stored = patched.clone();
        self.publish(WatchEvent::Modified(patched.clone()));
        Ok(patched)
    }

    async fn watch(&self, params: &ListParams) -> Result<Watch<O>> {
        self.take_injected()?;
        let mut sub = self.events.subscribe();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let params = params.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = sub.recv() => match received {
                        Ok(event) => {
                            if params.matches(event.object()) && tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            let _ = tx
                                .send(Err(ClusterError::WatchExpired(format!(
                                    "watcher fell behind by {} events",
                                    missed
                                ))))
                                .await;
                            break;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(Watch::new(rx))
    }
}

/// Apply an RFC 7386 JSON merge patch in place.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (k, v) in patch_fields {
            if v.is_null() {
                fields.remove(k);
            } else {
                merge_patch(fields.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runwarden_types::{LabelSelector, ObjectMeta, Phase, Pod, WorkflowRun};
    use serde_json::json;

    fn run(name: &str) -> WorkflowRun {
        WorkflowRun::new(ObjectMeta::new("ci", name), "build")
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let client = InMemoryClient::<WorkflowRun>::new();
        let created = client.create(run("r1")).await.unwrap();
        assert!(created.metadata.resource_version > 0);

        let key = ObjectKey::new("ci", "r1");
        assert_eq!(client.get(&key).await.unwrap(), created);

        client.delete(&key).await.unwrap();
        assert!(client.get(&key).await.unwrap_err().is_not_found());
        assert!(client.delete(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_duplicate_rejected() {
        let client = InMemoryClient::<WorkflowRun>::new();
        client.create(run("r1")).await.unwrap();
        let err = client.create(run("r1")).await.unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_conflict_on_stale_version() {
        let client = InMemoryClient::<WorkflowRun>::new();
        let created = client.create(run("r1")).await.unwrap();
        client.update(created.clone()).await.unwrap();

        let err = client.update(created).await.unwrap_err();
        assert!(matches!(err, ClusterError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_status_leaves_spec() {
        let client = InMemoryClient::<WorkflowRun>::new();
        let created = client.create(run("r1")).await.unwrap();

        let mut changed = created.clone();
        changed.spec.workflow_ref.name = "other".into();
        changed.status.phase = Phase::Running;
        let updated = client.update_status(changed).await.unwrap();

        assert_eq!(updated.status.phase, Phase::Running);
        assert_eq!(updated.spec.workflow_ref.name, "build");
    }

    #[tokio::test]
    async fn test_update_leaves_status() {
        let client = InMemoryClient::<WorkflowRun>::new();
        let mut created = client.create(run("r1")).await.unwrap();
        created.status.phase = Phase::Failed;
        created.metadata.labels.insert("tier".into(), "gold".into());

        let updated = client.update(created).await.unwrap();
        assert_eq!(updated.status.phase, Phase::Pending);
        assert_eq!(updated.metadata.labels["tier"], "gold");
    }

    #[tokio::test]
    async fn test_list_and_delete_collection_by_selector() {
        let client = InMemoryClient::<Pod>::new();
        for (name, app) in [("a", "web"), ("b", "web"), ("c", "db")] {
            client
                .create(Pod::new(ObjectMeta::new("ci", name).with_label("app", app)))
                .await
                .unwrap();
        }

        let web = ListParams::all().with_selector(LabelSelector::new().with_requirement("app", "web"));
        assert_eq!(client.list(&web).await.unwrap().len(), 2);
        assert_eq!(client.delete_collection(&web).await.unwrap(), 2);
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_merges_fields() {
        let client = InMemoryClient::<WorkflowRun>::new();
        client.create(run("r1")).await.unwrap();
        let key = ObjectKey::new("ci", "r1");

        let patched = client
            .patch(&key, json!({"metadata": {"labels": {"team": "infra"}}, "status": {"phase": "Succeeded"}}))
            .await
            .unwrap();
        assert_eq!(patched.metadata.labels["team"], "infra");
        assert_eq!(patched.status.phase, Phase::Succeeded);

        let err = client
            .patch(&key, json!({"metadata": {"name": "renamed"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_watch_delivers_matching_events() {
        let client = InMemoryClient::<Pod>::new();
        let mut watch = client.watch(&ListParams::all().in_namespace("ci")).await.unwrap();

        client.create(Pod::new(ObjectMeta::new("other", "skip"))).await.unwrap();
        client.create(Pod::new(ObjectMeta::new("ci", "keep"))).await.unwrap();
        client.delete(&ObjectKey::new("ci", "keep")).await.unwrap();

        match watch.next().await.unwrap().unwrap() {
            WatchEvent::Added(pod) => assert_eq!(pod.metadata.name, "keep"),
            other => panic!("expected Added, got {other:?}"),
        }
        match watch.next().await.unwrap().unwrap() {
            WatchEvent::Deleted(pod) => assert_eq!(pod.metadata.name, "keep"),
            other => panic!("expected Deleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let client = InMemoryClient::<WorkflowRun>::new();
        client.fail_next(ClusterError::Unavailable("down".into()));
        assert!(client.create(run("r1")).await.is_err());
        assert!(client.create(run("r1")).await.is_ok());
    }

    #[test]
    fn test_merge_patch_null_removes() {
        let mut doc = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut doc, &json!({"a": null, "b": {"c": 5}}));
        assert_eq!(doc, json!({"b": {"c": 5, "d": 3}}));
    }
}
