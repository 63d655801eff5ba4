//! Shared object model for the runwarden workflow controller.
//!
//! Provides the cluster-resident objects the controller watches (pods and
//! workflow runs), their metadata, the `namespace/name` keys that
//! flow through the work queues, and the four-valued execution [`Phase`].

pub mod error;
pub mod key;
pub mod labels;
pub mod meta;
pub mod objects;
pub mod phase;

pub use error::KeyError;
pub use key::{ObjectKey, WorkKey};
pub use labels::{
    LabelSelector, POD_KIND_LABEL, STAGE_POD_KIND, WORKFLOW_RUN_LABEL, workflow_pod_selector,
};
pub use meta::ObjectMeta;
pub use objects::{
    Object, Pod, PodStatus, WorkflowRef, WorkflowRun, WorkflowRunSpec, WorkflowRunStatus,
};
pub use phase::{Phase, StageStatus};
