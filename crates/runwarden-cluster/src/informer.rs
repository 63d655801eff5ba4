//! List/watch cache with periodic resync.
//!
//! An [`Informer`] lists every matching object, then follows a watch to keep a
//! local cache current, calling its [`ResourceEventHandler`]s for each change.
//! Every `resync_period` it re-delivers the whole cache as `on_update(o, o)`
//! so handlers can re-assert state for objects that have not changed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use runwarden_types::{Object, ObjectKey};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ListParams, SharedClient, WatchEvent};
use crate::error::{ClusterError, Result};
use crate::handler::ResourceEventHandler;

/// Default delay before relisting after a failed list or a broken watch.
pub const DEFAULT_RELIST_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for an informer.
#[derive(Debug, Clone)]
pub struct InformerConfig {
    /// How often the full cache is re-delivered to handlers.
    pub resync_period: Duration,
    /// Which objects to list and watch.
    pub params: ListParams,
    /// Delay before relisting after an error.
    pub relist_backoff: Duration,
}

impl InformerConfig {
    /// Watch everything, resyncing every `resync_period`.
    pub fn new(resync_period: Duration) -> Self {
        Self {
            resync_period,
            params: ListParams::all(),
            relist_backoff: DEFAULT_RELIST_BACKOFF,
        }
    }

    /// Restrict the informer to `params`.
    pub fn with_params(mut self, params: ListParams) -> Self {
        self.params = params;
        self
    }
}

type Handlers<O> = Vec<Arc<dyn ResourceEventHandler<O>>>;

/// Cached, notifying view of one resource kind.
pub struct Informer<O: Object> {
    client: SharedClient<O>,
    config: InformerConfig,
    cache: RwLock<HashMap<ObjectKey, O>>,
    handlers: RwLock<Handlers<O>>,
    synced: watch::Sender<bool>,
}

impl<O: Object> Informer<O> {
    /// Create an informer over `client`. Nothing happens until [`Informer::run`].
    pub fn new(client: SharedClient<O>, config: InformerConfig) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            client,
            config,
            cache: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            synced,
        }
    }

    /// Register a handler. Handlers added after the first list miss its adds.
    pub fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<O>>) {
        self.handlers.write().push(handler);
    }

    /// Cached object for `key`.
    pub fn get(&self, key: &ObjectKey) -> Option<O> {
        self.cache.read().get(key).cloned()
    }

    /// Snapshot of every cached object.
    pub fn list(&self) -> Vec<O> {
        self.cache.read().values().cloned().collect()
    }

    /// Whether the initial list has been delivered.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Wait until the initial list has been delivered.
    pub async fn wait_for_sync(&self) {
        let mut rx = self.synced.subscribe();
        // The sender lives as long as `self`, so this only ends on sync.
        let _ = rx.wait_for(|synced| *synced).await;
    }

    /// Run until `shutdown` is cancelled, relisting after watch failures.
    pub async fn run(&self, shutdown: CancellationToken) {
        let period = self.config.resync_period;
        let mut resync = interval_at(Instant::now() + period, period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(kind = O::KIND, resync_secs = period.as_secs(), "Informer started");

        while !shutdown.is_cancelled() {
            match self.list_and_watch(&shutdown, &mut resync).await {
                Ok(()) => break,
                Err(e) => {
                    warn!(kind = O::KIND, error = %e, "List/watch failed, relisting");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.relist_backoff) => {}
                    }
                }
            }
        }

        info!(kind = O::KIND, "Informer stopped");
    }

    /// Returns `Ok` only on shutdown.
    async fn list_and_watch(&self, shutdown: &CancellationToken, resync: &mut Interval) -> Result<()> {
        // Watch before listing so nothing between the two is missed; events
        // already reflected in the list are discarded by version.
        let mut watch = self.client.watch(&self.config.params).await?;
        let objects = self.client.list(&self.config.params).await?;
        self.replace(objects);
        self.synced.send_replace(true);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = resync.tick() => self.resync(),
                event = watch.next() => match event {
                    Some(Ok(event)) => self.apply(event),
                    Some(Err(e)) => return Err(e),
                    None => return Err(ClusterError::WatchExpired("watch closed".into())),
                },
            }
        }
    }

    fn handlers(&self) -> Handlers<O> {
        self.handlers.read().clone()
    }

    /// Swap the cache for a fresh list, notifying the difference.
    fn replace(&self, objects: Vec<O>) {
        let fresh: HashMap<ObjectKey, O> = objects.into_iter().map(|o| (o.key(), o)).collect();
        let previous = std::mem::replace(&mut *self.cache.write(), fresh.clone());
        let handlers = self.handlers();

        for (key, obj) in &fresh {
            match previous.get(key) {
                Some(old) => handlers.iter().for_each(|h| h.on_update(old, obj)),
                None => handlers.iter().for_each(|h| h.on_add(obj)),
            }
        }
        for (key, old) in &previous {
            if !fresh.contains_key(key) {
                handlers.iter().for_each(|h| h.on_delete(old));
            }
        }

        debug!(kind = O::KIND, count = fresh.len(), "Cache replaced from list");
    }

    fn apply(&self, event: WatchEvent<O>) {
        let handlers = self.handlers();
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                let key = obj.key();
                let previous = {
                    let mut cache = self.cache.write();
                    if let Some(current) = cache.get(&key)
                        && current.meta().resource_version >= obj.meta().resource_version
                    {
                        return;
                    }
                    cache.insert(key, obj.clone())
                };
                match previous {
                    Some(old) => handlers.iter().for_each(|h| h.on_update(&old, &obj)),
                    None => handlers.iter().for_each(|h| h.on_add(&obj)),
                }
            }
            WatchEvent::Deleted(obj) => {
                let key = obj.key();
                let removed = {
                    let mut cache = self.cache.write();
                    match cache.get(&key) {
                        Some(current) if current.meta().resource_version > obj.meta().resource_version => None,
                        _ => cache.remove(&key),
                    }
                };
                if let Some(last) = removed {
                    handlers.iter().for_each(|h| h.on_delete(&last));
                }
            }
        }
    }

    fn resync(&self) {
        let objects = self.list();
        let handlers = self.handlers();
        debug!(kind = O::KIND, count = objects.len(), "Resyncing cache");
        for obj in &objects {
            handlers.iter().for_each(|h| h.on_update(obj, obj));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResourceClient;
    use crate::memory::InMemoryClient;
    use parking_lot::Mutex;
    use runwarden_types::{LabelSelector, ObjectMeta, Pod};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl ResourceEventHandler<Pod> for Recorder {
        fn on_add(&self, obj: &Pod) {
            self.events.lock().push(format!("add {}", obj.key()));
        }

        fn on_update(&self, old: &Pod, new: &Pod) {
            let tag = if old == new { "resync" } else { "update" };
            self.events.lock().push(format!("{} {}", tag, new.key()));
        }

        fn on_delete(&self, obj: &Pod) {
            self.events.lock().push(format!("delete {}", obj.key()));
        }
    }

    /// With paused time, sleeping only returns once every task is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_list_then_watch() {
        let client = Arc::new(InMemoryClient::<Pod>::new());
        client.create(Pod::new(ObjectMeta::new("ci", "existing"))).await.unwrap();

        let informer = Arc::new(Informer::new(
            client.clone(),
            InformerConfig::new(Duration::from_secs(300)),
        ));
        let recorder = Arc::new(Recorder::default());
        informer.add_event_handler(recorder.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let informer = informer.clone();
            let shutdown = shutdown.clone();
            async move { informer.run(shutdown).await }
        });

        informer.wait_for_sync().await;
        assert!(informer.has_synced());
        assert_eq!(recorder.take(), vec!["add ci/existing"]);

        let mut pod = client.create(Pod::new(ObjectMeta::new("ci", "new"))).await.unwrap();
        pod.metadata.labels.insert("x".into(), "y".into());
        client.update(pod).await.unwrap();
        client.delete(&ObjectKey::new("ci", "existing")).await.unwrap();
        settle().await;

        assert_eq!(
            recorder.take(),
            vec!["add ci/new", "update ci/new", "delete ci/existing"]
        );
        assert!(informer.get(&ObjectKey::new("ci", "new")).is_some());
        assert!(informer.get(&ObjectKey::new("ci", "existing")).is_none());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_redelivers_cache() {
        let client = Arc::new(InMemoryClient::<Pod>::new());
        client.create(Pod::new(ObjectMeta::new("ci", "p"))).await.unwrap();

        let informer = Arc::new(Informer::new(
            client.clone(),
            InformerConfig::new(Duration::from_secs(30)),
        ));
        let recorder = Arc::new(Recorder::default());
        informer.add_event_handler(recorder.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let informer = informer.clone();
            let shutdown = shutdown.clone();
            async move { informer.run(shutdown).await }
        });
        informer.wait_for_sync().await;
        recorder.take();

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(recorder.take(), vec!["resync ci/p"]);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_selector_filters_cache() {
        let client = Arc::new(InMemoryClient::<Pod>::new());
        client
            .create(Pod::new(ObjectMeta::new("ci", "stage").with_label("kind", "stage")))
            .await
            .unwrap();
        client.create(Pod::new(ObjectMeta::new("ci", "other"))).await.unwrap();

        let params = ListParams::all().with_selector(LabelSelector::new().with_requirement("kind", "stage"));
        let informer = Arc::new(Informer::new(
            client.clone(),
            InformerConfig::new(Duration::from_secs(300)).with_params(params),
        ));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let informer = informer.clone();
            let shutdown = shutdown.clone();
            async move { informer.run(shutdown).await }
        });
        informer.wait_for_sync().await;

        let cached = informer.list();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].metadata.name, "stage");

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_relists_after_failed_watch() {
        let client = Arc::new(InMemoryClient::<Pod>::new());
        client.fail_next(ClusterError::Unavailable("boot".into()));

        let informer = Arc::new(Informer::new(
            client.clone(),
            InformerConfig::new(Duration::from_secs(300)),
        ));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let informer = informer.clone();
            let shutdown = shutdown.clone();
            async move { informer.run(shutdown).await }
        });

        informer.wait_for_sync().await;
        assert!(informer.has_synced());

        shutdown.cancel();
        task.await.unwrap();
    }
}
