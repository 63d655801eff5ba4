//! Reconcile handlers for the watched kinds.

mod pod;
mod workflow_run;

pub use pod::PodHandler;
pub use workflow_run::WorkflowRunHandler;
