//! Cluster-resident objects watched by the controller.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::key::ObjectKey;
use crate::meta::ObjectMeta;
use crate::phase::{Phase, StageStatus};

/// A resource kind that can be stored, watched and reconciled.
///
/// `PartialEq` is the deep equality used to suppress no-op updates.
pub trait Object:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Resource kind name, used in logs and errors.
    const KIND: &'static str;

    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// The `namespace/name` key of this object.
    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    /// Replace this object's status with `other`'s, leaving spec and metadata.
    ///
    /// Kinds without a status keep the default no-op.
    fn copy_status_from(&mut self, _other: &Self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Pod
// ─────────────────────────────────────────────────────────────────────────────

/// Observed state of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    /// Coarse pod phase.
    pub phase: Phase,
}

/// A pod executing one stage of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            status: PodStatus::default(),
        }
    }
}

impl Object for Pod {
    const KIND: &'static str = "Pod";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status = other.status.clone();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkflowRun
// ─────────────────────────────────────────────────────────────────────────────

/// Reference from a run to the workflow it instantiates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Workflow namespace; empty means "same namespace as the run".
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

/// Desired state of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunSpec {
    pub workflow_ref: WorkflowRef,
}

/// Observed state of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunStatus {
    /// Overall phase, derived from `stages`.
    #[serde(default)]
    pub phase: Phase,
    /// Per-stage status keyed by stage name.
    #[serde(default)]
    pub stages: HashMap<String, StageStatus>,
}

/// One execution instance of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub metadata: ObjectMeta,
    pub spec: WorkflowRunSpec,
    #[serde(default)]
    pub status: WorkflowRunStatus,
}

impl WorkflowRun {
    /// Create a run of `workflow` in the given namespace.
    pub fn new(metadata: ObjectMeta, workflow: impl Into<String>) -> Self {
        Self {
            metadata,
            spec: WorkflowRunSpec {
                workflow_ref: WorkflowRef {
                    namespace: String::new(),
                    name: workflow.into(),
                },
            },
            status: WorkflowRunStatus::default(),
        }
    }

    /// Key of the workflow this run belongs to.
    ///
    /// An empty reference namespace resolves to the run's own namespace.
    pub fn workflow_key(&self) -> ObjectKey {
        let wf = &self.spec.workflow_ref;
        let namespace = if wf.namespace.is_empty() {
            &self.metadata.namespace
        } else {
            &wf.namespace
        };
        ObjectKey::new(namespace, &wf.name)
    }
}

impl Object for WorkflowRun {
    const KIND: &'static str = "WorkflowRun";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status = other.status.clone();
    }
}
