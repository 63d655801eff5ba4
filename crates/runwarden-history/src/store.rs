//! Per-workflow run history with eviction and stale-entry sweeping.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use runwarden_types::{ObjectKey, ObjectMeta};
use tracing::{debug, error, info, warn};

use crate::config::HistoryConfig;
use crate::deleter::RunDeleter;
use crate::queue::{RunQueue, RunRef};

type SharedQueue = Arc<Mutex<RunQueue>>;

/// Result of [`RunHistoryStore::add_or_refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// A new entry was inserted (as opposed to refreshed).
    pub inserted: bool,
    /// Runs evicted to respect the size limit.
    pub evicted: Vec<RunRef>,
}

/// Run history for every workflow.
///
/// The workflow map and each queue are locked separately, so operations on
/// different workflows do not block each other. Queue locks are never held
/// across the cluster deletes issued for evicted runs.
pub struct RunHistoryStore {
    queues: RwLock<HashMap<String, SharedQueue>>,
    config: HistoryConfig,
    deleter: Arc<dyn RunDeleter>,
}

impl RunHistoryStore {
    /// Create a store. When enabled in `config` and a tokio runtime is
    /// available, a background sweep task is spawned; it stops once the
    /// returned handle and all its clones are dropped.
    pub fn new(config: HistoryConfig, deleter: Arc<dyn RunDeleter>) -> Arc<Self> {
        let store = Arc::new(Self {
            queues: RwLock::new(HashMap::new()),
            config,
            deleter,
        });

        if store.config.enable_sweep_task {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(sweep_loop(Arc::downgrade(&store), store.config.sweep_interval));
                }
                Err(_) => warn!("No tokio runtime; run history sweep task not started"),
            }
        }

        store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Number of workflows with a queue.
    pub fn workflow_count(&self) -> usize {
        self.queues.read().len()
    }

    /// Copy of the entries tracked for `workflow`, oldest first.
    pub fn snapshot(&self, workflow: &ObjectKey) -> Option<Vec<RunRef>> {
        let queue = self.queue(&workflow.to_string())?;
        let guard = queue.lock();
        Some(guard.iter().cloned().collect())
    }

    pub(crate) fn queue(&self, key: &str) -> Option<SharedQueue> {
        self.queues.read().get(key).cloned()
    }

    fn queue_or_insert(&self, key: &str) -> SharedQueue {
        if let Some(queue) = self.queue(key) {
            return queue;
        }

        let mut queues = self.queues.write();
        queues
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(workflow = %key, "Creating run history queue");
                Arc::new(Mutex::new(RunQueue::new(key)))
            })
            .clone()
    }

    /// Track `run` under `workflow`, evicting and deleting the oldest runs
    /// past the size limit.
    pub async fn add_or_refresh(&self, workflow: &ObjectKey, run: &ObjectMeta) -> AddOutcome {
        self.add_or_refresh_at(workflow, run, Utc::now()).await
    }

    /// [`add_or_refresh`](Self::add_or_refresh) with an explicit clock.
    pub async fn add_or_refresh_at(
        &self,
        workflow: &ObjectKey,
        run: &ObjectMeta,
        now: DateTime<Utc>,
    ) -> AddOutcome {
        let key = workflow.to_string();
        let queue = self.queue_or_insert(&key);

        let outcome = {
            let mut guard = queue.lock();
            let entry = RunRef::new(&run.namespace, &run.name, run.creation_timestamp, now);
            let inserted = guard.push_or_refresh(entry);
            let evicted = guard.evict_overflow(self.config.max_queue_size);
            AddOutcome { inserted, evicted }
        };

        if outcome.inserted {
            debug!(workflow = %key, run = %run.key(), "Tracking workflow run");
        }

        for old in &outcome.evicted {
            self.delete_evicted(&key, old).await;
        }

        outcome
    }

    async fn delete_evicted(&self, workflow: &str, run: &RunRef) {
        let run_key = run.key();
        info!(workflow = %workflow, run = %run_key, "Evicting oldest workflow run");
        match self.deleter.delete_run(&run_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!(run = %run_key, "Evicted workflow run already gone");
            }
            Err(e) => {
                error!(run = %run_key, error = %e, "Failed to delete evicted workflow run");
            }
        }
    }

    /// Mark an already tracked run as alive. Returns whether it was tracked.
    pub fn refresh(&self, workflow: &ObjectKey, run: &ObjectMeta) -> bool {
        self.refresh_at(workflow, run, Utc::now())
    }

    /// [`refresh`](Self::refresh) with an explicit clock.
    pub fn refresh_at(&self, workflow: &ObjectKey, run: &ObjectMeta, now: DateTime<Utc>) -> bool {
        let key = workflow.to_string();
        let Some(queue) = self.queue(&key) else {
            debug!(workflow = %key, run = %run.key(), "No run history for workflow");
            return false;
        };
        queue.lock().refresh(&run.namespace, &run.name, now)
    }

    /// Drop entries not refreshed within the staleness threshold.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock. Returns the number of
    /// entries removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(threshold) = chrono::Duration::from_std(self.config.staleness_threshold()) else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub_signed(threshold) else {
            return 0;
        };

        let queues: Vec<SharedQueue> = self.queues.read().values().cloned().collect();
        let mut removed = 0;
        for queue in queues {
            let mut guard = queue.lock();
            for stale in guard.remove_stale(cutoff) {
                info!(
                    workflow = %guard.key(),
                    run = %stale.key(),
                    last_refreshed = %stale.last_refreshed_at,
                    "Forgetting stale workflow run"
                );
                removed += 1;
            }
        }
        removed
    }
}

async fn sweep_loop(store: Weak<RunHistoryStore>, period: std::time::Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Run history dropped; stopping sweep task");
            return;
        };
        let removed = store.sweep();
        if removed > 0 {
            debug!(removed, "Run history sweep complete");
        }
    }
}
