//! Deduplicating, rate-limited work queue.
//!
//! A key is in at most one of three places: waiting in the queue, being
//! processed by a worker, or both at once when it was re-added mid-flight. In
//! the last case it is only handed out again after [`EventQueue::done`], so no
//! two workers ever process the same key concurrently.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use runwarden_types::WorkKey;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::rate_limit::RateLimiter;

#[derive(Default)]
struct State {
    queue: VecDeque<WorkKey>,
    /// Keys that need processing, queued or not.
    dirty: HashSet<WorkKey>,
    /// Keys handed out and not yet marked done.
    processing: HashSet<WorkKey>,
    shutting_down: bool,
}

/// Work queue shared by the event translator and the worker pool.
pub struct EventQueue {
    name: String,
    state: Mutex<State>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter>,
}

impl EventQueue {
    /// Create a queue. `name` only labels log lines.
    pub fn new(name: impl Into<String>, rate_limiter: Box<dyn RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            rate_limiter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark `key` as needing processing.
    ///
    /// A key already waiting is not queued twice. A key currently being
    /// processed is queued once more when its worker calls [`done`](Self::done).
    pub fn add(&self, key: WorkKey) {
        let mut state = self.state.lock();
        if state.shutting_down {
            trace!(queue = %self.name, key = %key, "Queue shutting down, ignoring key");
            return;
        }
        if !state.dirty.insert(key.clone()) {
            trace!(queue = %self.name, key = %key, "Key already pending");
            return;
        }
        if state.processing.contains(&key) {
            debug!(queue = %self.name, key = %key, "Key in flight, will reprocess");
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key. Returns `None` once the queue is shut down and
    /// drained.
    pub async fn get(&self) -> Option<WorkKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so an add in between is not lost.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        // Pass the wakeup on in case several keys arrived at once.
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Finish processing `key`, requeueing it if it was added meanwhile.
    pub fn done(&self, key: &WorkKey) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Add `key` after `delay`. Requires a tokio runtime for non-zero delays.
    pub fn add_after(self: &Arc<Self>, key: WorkKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        if self.is_shutting_down() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = Arc::clone(self);
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.add(key);
                });
            }
            Err(_) => {
                warn!(queue = %self.name, key = %key, "No tokio runtime, adding without delay");
                self.add(key);
            }
        }
    }

    /// Add `key` after the delay chosen by the rate limiter.
    pub fn add_rate_limited(self: &Arc<Self>, key: WorkKey) {
        let delay = self.rate_limiter.when(&key);
        debug!(
            queue = %self.name,
            key = %key,
            delay_ms = delay.as_millis() as u64,
            "Requeueing with backoff"
        );
        self.add_after(key, delay);
    }

    /// Reset the rate limiter's failure history for `key`.
    pub fn forget(&self, key: &WorkKey) {
        self.rate_limiter.forget(key);
    }

    /// Failures recorded for `key`.
    pub fn num_requeues(&self, key: &WorkKey) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting keys and wake every waiting worker. Keys already
    /// queued are still handed out.
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
        debug!(queue = %self.name, "Queue shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }
}
