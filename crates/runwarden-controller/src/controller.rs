//! Reconcile loop: informer, event queue and worker pool for one kind.

use std::sync::Arc;

use async_trait::async_trait;
use runwarden_cluster::Informer;
use runwarden_types::{LabelSelector, Object, ObjectKey, WorkKey};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ControllerError, Result};
use crate::queue::EventQueue;
use crate::rate_limit::RateLimiter;
use crate::translator::EventTranslator;

/// Reconciles one object kind.
///
/// Called with the informer's cached object when it exists, or with the key
/// alone once the object is gone. Returning an error retries the key with
/// backoff.
#[async_trait]
pub trait Handler<O: Object>: Send + Sync + 'static {
    async fn object_changed(&self, obj: O) -> Result<()>;

    async fn object_deleted(&self, key: ObjectKey) -> Result<()>;
}

/// Per-controller behaviour knobs.
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    /// Give up on a key after this many consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Only enqueue objects matching this selector.
    pub selector: Option<LabelSelector>,
    /// Drop updates where the old and new object are equal.
    pub suppress_equal_updates: bool,
}

struct Shared<O: Object> {
    name: String,
    informer: Arc<Informer<O>>,
    queue: Arc<EventQueue>,
    handler: Arc<dyn Handler<O>>,
    max_retries: Option<u32>,
}

/// Informer-driven controller for objects of kind `O`.
pub struct Controller<O: Object> {
    shared: Arc<Shared<O>>,
}

impl<O: Object> Controller<O> {
    /// Create a controller and register its event translator on `informer`.
    pub fn new(
        name: impl Into<String>,
        informer: Arc<Informer<O>>,
        handler: Arc<dyn Handler<O>>,
        rate_limiter: Box<dyn RateLimiter>,
        options: ControllerOptions,
    ) -> Self {
        let name = name.into();
        let queue = EventQueue::new(name.clone(), rate_limiter);

        let mut translator =
            EventTranslator::new(queue.clone()).suppress_equal_updates(options.suppress_equal_updates);
        if let Some(selector) = options.selector {
            translator = translator.with_selector(selector);
        }
        informer.add_event_handler(Arc::new(translator));

        Self {
            shared: Arc::new(Shared {
                name,
                informer,
                queue,
                handler,
                max_retries: options.max_retries,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue feeding this controller's workers.
    pub fn queue(&self) -> Arc<EventQueue> {
        self.shared.queue.clone()
    }

    pub fn informer(&self) -> &Arc<Informer<O>> {
        &self.shared.informer
    }

    /// Queue `key` for reconciliation.
    pub fn enqueue(&self, key: WorkKey) {
        self.shared.queue.add(key);
    }

    /// Run the informer and `workers` workers until `shutdown` is cancelled.
    ///
    /// Workers start only after the informer delivered its initial list. On
    /// shutdown the queue stops accepting keys and in-flight work finishes.
    pub async fn run(&self, workers: usize, shutdown: CancellationToken) {
        let shared = &self.shared;
        let informer = shared.informer.clone();
        let informer_token = shutdown.child_token();
        let informer_task = tokio::spawn(async move { informer.run(informer_token).await });

        info!(controller = %shared.name, "Waiting for informer sync");
        let synced = tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = shared.informer.wait_for_sync() => true,
        };

        let mut pool = JoinSet::new();
        if synced {
            info!(controller = %shared.name, workers, "Starting workers");
            for _ in 0..workers.max(1) {
                let shared = shared.clone();
                pool.spawn(async move { while shared.process_next().await {} });
            }
            shutdown.cancelled().await;
        }

        info!(controller = %shared.name, "Shutting down");
        shared.queue.shut_down();
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(controller = %shared.name, error = %e, "Worker task failed");
            }
        }
        if let Err(e) = informer_task.await {
            error!(controller = %shared.name, error = %e, "Informer task failed");
        }
        info!(controller = %shared.name, "Stopped");
    }
}

impl<O: Object> Shared<O> {
    /// Process one key. Returns `false` once the queue is shut down and empty.
    async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let result = self.reconcile(&key).await;
        self.handle_result(&key, result);
        self.queue.done(&key);
        true
    }

    async fn reconcile(&self, key: &WorkKey) -> Result<()> {
        let object_key = key.parse()?;
        let cached = self.informer.get(&object_key);
        let handler = self.handler.clone();

        // A panicking handler surfaces as a JoinError instead of killing the worker.
        let task = tokio::spawn(async move {
            match cached {
                Some(obj) => handler.object_changed(obj).await,
                None => handler.object_deleted(object_key).await,
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                error!(controller = %self.name, key = %key, "Handler panicked");
                Err(ControllerError::handler(format!("handler panicked on {key}")))
            }
            Err(e) => Err(ControllerError::handler(e.to_string())),
        }
    }

    fn handle_result(&self, key: &WorkKey, result: Result<()>) {
        let err = match result {
            Ok(()) => {
                debug!(controller = %self.name, key = %key, "Reconciled");
                self.queue.forget(key);
                return;
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            warn!(controller = %self.name, key = %key, error = %err, "Dropping key");
            self.queue.forget(key);
            return;
        }

        let failures = self.queue.num_requeues(key);
        if let Some(max) = self.max_retries
            && failures >= max
        {
            warn!(
                controller = %self.name,
                key = %key,
                failures,
                error = %err,
                "Giving up on key"
            );
            self.queue.forget(key);
            return;
        }

        warn!(controller = %self.name, key = %key, error = %err, "Reconcile failed, retrying");
        self.queue.add_rate_limited(key.clone());
    }
}
