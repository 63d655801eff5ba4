//! Label selectors and the well-known labels the controller stamps on objects.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label marking what role a pod plays in a workflow run.
pub const POD_KIND_LABEL: &str = "runwarden.io/pod-kind";

/// Value of [`POD_KIND_LABEL`] for pods that execute a stage.
pub const STAGE_POD_KIND: &str = "stage";

/// Label carrying the name of the workflow run that owns an object.
pub const WORKFLOW_RUN_LABEL: &str = "runwarden.io/workflowrun";

/// Selector matching every stage pod created for a workflow run.
pub fn workflow_pod_selector() -> LabelSelector {
    LabelSelector::new().with_requirement(POD_KIND_LABEL, STAGE_POD_KIND)
}

/// Equality-based label selector (`k1=v1,k2=v2`).
///
/// An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSelector {
    requirements: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Create a selector that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `key=value` requirement.
    pub fn with_requirement(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    /// Whether the selector has no requirements.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Check whether a label set satisfies every requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        assert!(LabelSelector::new().matches(&BTreeMap::new()));
        assert!(LabelSelector::new().matches(&labels(&[("a", "b")])));
    }

    #[test]
    fn test_workflow_pod_selector() {
        let selector = workflow_pod_selector();
        assert!(selector.matches(&labels(&[(POD_KIND_LABEL, STAGE_POD_KIND), ("x", "y")])));
        assert!(!selector.matches(&labels(&[(POD_KIND_LABEL, "gc")])));
        assert!(!selector.matches(&labels(&[("x", "y")])));
    }

    #[test]
    fn test_display_sorts_requirements() {
        let selector = LabelSelector::new()
            .with_requirement("b", "2")
            .with_requirement("a", "1");
        assert_eq!(selector.to_string(), "a=1,b=2");
        assert!(selector.matches(&labels(&[("a", "1"), ("b", "2")])));
        assert!(!selector.matches(&labels(&[("a", "1")])));
        assert_eq!(LabelSelector::new().to_string(), "");
    }

    #[test]
    fn test_serializes_as_label_map() {
        let selector = workflow_pod_selector();
        let json = serde_json::to_value(&selector).unwrap();
        assert_eq!(json, serde_json::json!({ POD_KIND_LABEL: STAGE_POD_KIND }));
        let back: LabelSelector = serde_json::from_value(json).unwrap();
        assert_eq!(back, selector);
    }
}
