//! Stage pods: route changes to the owning workflow run.

use std::sync::Arc;

use async_trait::async_trait;
use runwarden_types::{Object, ObjectKey, Pod, WORKFLOW_RUN_LABEL, WorkKey};
use tracing::debug;

use crate::controller::Handler;
use crate::error::Result;
use crate::queue::EventQueue;

/// Requeues the workflow run owning a changed stage pod.
pub struct PodHandler {
    runs: Arc<EventQueue>,
}

impl PodHandler {
    /// `runs` is the workflow-run controller's queue.
    pub fn new(runs: Arc<EventQueue>) -> Self {
        Self { runs }
    }

    /// Key of the run owning `pod`, from its run label.
    pub fn owning_run(pod: &Pod) -> Option<ObjectKey> {
        pod.metadata
            .labels
            .get(WORKFLOW_RUN_LABEL)
            .filter(|run| !run.is_empty())
            .map(|run| ObjectKey::new(&pod.metadata.namespace, run))
    }
}

#[async_trait]
impl Handler<Pod> for PodHandler {
    async fn object_changed(&self, pod: Pod) -> Result<()> {
        match Self::owning_run(&pod) {
            Some(run) => {
                debug!(pod = %pod.key(), run = %run, "Pod changed, requeueing run");
                self.runs.add(WorkKey::from(run));
            }
            None => debug!(pod = %pod.key(), "Pod has no owning run"),
        }
        Ok(())
    }

    async fn object_deleted(&self, key: ObjectKey) -> Result<()> {
        debug!(pod = %key, "Pod deleted");
        Ok(())
    }
}
