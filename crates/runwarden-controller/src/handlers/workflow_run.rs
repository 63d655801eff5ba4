//! Workflow run lifecycle: history retention and overall phase.

use std::sync::Arc;

use async_trait::async_trait;
use runwarden_cluster::SharedClient;
use runwarden_history::RunHistoryStore;
use runwarden_types::{Object, ObjectKey, WorkflowRun};
use tracing::{debug, info};

use crate::controller::Handler;
use crate::error::Result;
use crate::status::run_phase;

/// Keeps a run's history entry alive and its overall phase current.
pub struct WorkflowRunHandler {
    history: Arc<RunHistoryStore>,
    runs: SharedClient<WorkflowRun>,
}

impl WorkflowRunHandler {
    pub fn new(history: Arc<RunHistoryStore>, runs: SharedClient<WorkflowRun>) -> Self {
        Self { history, runs }
    }
}

#[async_trait]
impl Handler<WorkflowRun> for WorkflowRunHandler {
    async fn object_changed(&self, run: WorkflowRun) -> Result<()> {
        let workflow = run.workflow_key();
        if !self.history.refresh(&workflow, &run.metadata) {
            self.history.add_or_refresh(&workflow, &run.metadata).await;
        }

        let phase = run_phase(&run.status);
        if phase == run.status.phase {
            return Ok(());
        }

        let key = run.key();
        let previous = run.status.phase;
        let mut updated = run;
        updated.status.phase = phase;
        match self.runs.update_status(updated).await {
            Ok(_) => {
                info!(run = %key, from = %previous, to = %phase, "Workflow run phase changed");
                Ok(())
            }
            // Evicted or deleted while we were computing.
            Err(e) if e.is_not_found() => {
                debug!(run = %key, "Workflow run gone before status update");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn object_deleted(&self, key: ObjectKey) -> Result<()> {
        // History forgets it on the next sweep.
        debug!(run = %key, "Workflow run deleted");
        Ok(())
    }
}
