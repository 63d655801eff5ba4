//! Turns informer notifications into queued keys.

use std::marker::PhantomData;
use std::sync::Arc;

use runwarden_cluster::ResourceEventHandler;
use runwarden_types::{LabelSelector, Object, WorkKey};
use tracing::trace;

use crate::queue::EventQueue;

/// Enqueues the `namespace/name` key of every object it is notified about.
pub struct EventTranslator<O> {
    queue: Arc<EventQueue>,
    selector: Option<LabelSelector>,
    suppress_equal_updates: bool,
    _object: PhantomData<fn(&O)>,
}

impl<O: Object> EventTranslator<O> {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            selector: None,
            suppress_equal_updates: false,
            _object: PhantomData,
        }
    }

    /// Only enqueue objects whose labels match `selector`.
    pub fn with_selector(mut self, selector: LabelSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Skip updates whose old and new objects are equal, including resyncs.
    pub fn suppress_equal_updates(mut self, suppress: bool) -> Self {
        self.suppress_equal_updates = suppress;
        self
    }

    fn enqueue(&self, obj: &O) {
        if let Some(selector) = &self.selector
            && !selector.matches(&obj.meta().labels)
        {
            trace!(kind = O::KIND, key = %obj.key(), "Object filtered by selector");
            return;
        }
        self.queue.add(WorkKey::from(obj.key()));
    }
}

impl<O: Object> ResourceEventHandler<O> for EventTranslator<O> {
    fn on_add(&self, obj: &O) {
        self.enqueue(obj);
    }

    fn on_update(&self, old: &O, new: &O) {
        if self.suppress_equal_updates && old == new {
            trace!(kind = O::KIND, key = %new.key(), "Skipping unchanged object");
            return;
        }
        self.enqueue(new);
    }

    fn on_delete(&self, obj: &O) {
        self.enqueue(obj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::BucketRateLimiter;
    use runwarden_types::{ObjectMeta, POD_KIND_LABEL, Pod, STAGE_POD_KIND, workflow_pod_selector};

    fn queue() -> Arc<EventQueue> {
        EventQueue::new("pods", Box::new(BucketRateLimiter::new(10, 100)))
    }

    fn stage_pod(name: &str) -> Pod {
        Pod::new(ObjectMeta::new("ci", name).with_label(POD_KIND_LABEL, STAGE_POD_KIND))
    }

    #[tokio::test]
    async fn test_add_and_delete_enqueue_key() {
        let q = queue();
        let translator = EventTranslator::<Pod>::new(q.clone());
        translator.on_add(&stage_pod("p1"));
        translator.on_delete(&stage_pod("p2"));

        assert_eq!(q.get().await, Some(WorkKey::new("ci/p1")));
        assert_eq!(q.get().await, Some(WorkKey::new("ci/p2")));
    }

    #[test]
    fn test_equal_update_suppressed_when_enabled() {
        let q = queue();
        let translator = EventTranslator::<Pod>::new(q.clone()).suppress_equal_updates(true);
        let pod = stage_pod("p1");
        translator.on_update(&pod, &pod);
        assert!(q.is_empty());

        let mut changed = pod.clone();
        changed.metadata.resource_version += 1;
        translator.on_update(&pod, &changed);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_equal_update_passes_by_default() {
        let q = queue();
        let translator = EventTranslator::<Pod>::new(q.clone());
        let pod = stage_pod("p1");
        translator.on_update(&pod, &pod);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_selector_filters_objects() {
        let q = queue();
        let translator = EventTranslator::<Pod>::new(q.clone()).with_selector(workflow_pod_selector());
        translator.on_add(&Pod::new(ObjectMeta::new("ci", "unrelated")));
        assert!(q.is_empty());

        translator.on_add(&stage_pod("p1"));
        assert_eq!(q.len(), 1);
    }
}
