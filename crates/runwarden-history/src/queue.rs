//! Per-workflow run sequence ordered by creation time.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use runwarden_types::ObjectKey;

/// One run tracked in a [`RunQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRef {
    /// Run name.
    pub name: String,
    /// Run namespace.
    pub namespace: String,
    /// When the run was created. Fixed once first observed.
    pub created_at: DateTime<Utc>,
    /// Last time the controller saw this run alive.
    pub last_refreshed_at: DateTime<Utc>,
}

impl RunRef {
    /// Create a reference, refreshed at `now`.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            created_at,
            last_refreshed_at: now,
        }
    }

    /// Key of the run object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

/// Runs of one workflow, ascending by `created_at`.
///
/// Runs with equal creation times keep their insertion order. At most one
/// entry exists per `(namespace, name)`. The queue itself does not enforce a
/// size limit; [`RunQueue::evict_overflow`] trims it from the oldest end.
#[derive(Debug, Clone)]
pub struct RunQueue {
    key: String,
    entries: VecDeque<RunRef>,
}

impl RunQueue {
    /// Create an empty queue for the workflow `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: VecDeque::new(),
        }
    }

    /// Workflow key this queue belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RunRef> {
        self.entries.iter()
    }

    /// Oldest entry.
    pub fn oldest(&self) -> Option<&RunRef> {
        self.entries.front()
    }

    /// Mark a run as seen at `now`. Returns whether it was tracked.
    pub fn refresh(&mut self, namespace: &str, name: &str, now: DateTime<Utc>) -> bool {
        match self.entries.iter_mut().find(|r| r.is(namespace, name)) {
            Some(entry) => {
                entry.last_refreshed_at = now;
                true
            }
            None => false,
        }
    }

    /// Insert `run` in creation order, or refresh it if already tracked.
    ///
    /// Returns `true` when a new entry was inserted. A tracked run keeps its
    /// original `created_at` and position; only `last_refreshed_at` moves.
    pub fn push_or_refresh(&mut self, run: RunRef) -> bool {
        if self.refresh(&run.namespace, &run.name, run.last_refreshed_at) {
            return false;
        }

        let pos = self.entries.partition_point(|r| r.created_at <= run.created_at);
        self.entries.insert(pos, run);
        true
    }

    /// Remove and return the oldest entry.
    pub fn pop_oldest(&mut self) -> Option<RunRef> {
        self.entries.pop_front()
    }

    /// Pop oldest entries until at most `max` remain.
    pub fn evict_overflow(&mut self, max: usize) -> Vec<RunRef> {
        let mut evicted = Vec::new();
        while self.entries.len() > max {
            match self.pop_oldest() {
                Some(run) => evicted.push(run),
                None => break,
            }
        }
        evicted
    }

    /// Remove entries last refreshed strictly before `cutoff`.
    pub fn remove_stale(&mut self, cutoff: DateTime<Utc>) -> Vec<RunRef> {
        let mut stale = Vec::new();
        self.entries.retain(|run| {
            if run.last_refreshed_at < cutoff {
                stale.push(run.clone());
                false
            } else {
                true
            }
        });
        stale
    }
}
