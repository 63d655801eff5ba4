//! Seam through which evicted runs are removed from the cluster.

use std::sync::Arc;

use async_trait::async_trait;
use runwarden_cluster::{ResourceClient, Result};
use runwarden_types::{ObjectKey, WorkflowRun};

/// Deletes workflow runs evicted from history.
///
/// A [`ClusterError::NotFound`](runwarden_cluster::ClusterError::NotFound)
/// result counts as success: the run is already gone.
#[async_trait]
pub trait RunDeleter: Send + Sync {
    /// Delete the run identified by `run`.
    async fn delete_run(&self, run: &ObjectKey) -> Result<()>;
}

#[async_trait]
impl<C> RunDeleter for Arc<C>
where
    C: ResourceClient<WorkflowRun> + ?Sized,
{
    async fn delete_run(&self, run: &ObjectKey) -> Result<()> {
        self.as_ref().delete(run).await
    }
}
