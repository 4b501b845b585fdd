//! Transform node records.

use crate::execution::{NodeOutcome, NodeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sigflow_core::{DatasetId, NodeId, WorkflowId};
use std::time::Duration;

/// One transform step of a workflow.
///
/// A node with no incoming edge reads `input_dataset`; a node with an
/// incoming edge reads its predecessor's output instead and must leave
/// `input_dataset` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub workflow_id: WorkflowId,
    pub name: String,
    /// Registry identifier of the transform, e.g. `"filter"`.
    pub operation_type: String,
    /// Free-form options passed to the transform's constructor.
    pub operation_config: JsonValue,
    pub input_dataset: Option<DatasetId>,
    /// Set once per run, when the node completes.
    pub output_dataset: Option<DatasetId>,
    pub status: NodeStatus,
    /// Only set when `status` is failed.
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeRecord {
    /// Creates a pending node with no configuration.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        name: impl Into<String>,
        operation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            workflow_id,
            name: name.into(),
            operation_type: operation_type.into(),
            operation_config: JsonValue::Null,
            input_dataset: None,
            output_dataset: None,
            status: NodeStatus::Pending,
            error: None,
            duration_ms: None,
            completed_at: None,
        }
    }

    /// Sets the operation configuration.
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.operation_config = config;
        self
    }

    /// Sets the input dataset for a root node.
    #[must_use]
    pub fn with_input(mut self, dataset_id: DatasetId) -> Self {
        self.input_dataset = Some(dataset_id);
        self
    }

    /// Clears all results of a previous run.
    pub fn reset(&mut self) {
        self.status = NodeStatus::Pending;
        self.output_dataset = None;
        self.error = None;
        self.duration_ms = None;
        self.completed_at = None;
    }

    /// Marks the node as running.
    pub fn start(&mut self) {
        self.status = NodeStatus::Running;
    }

    /// Records a successful execution.
    pub fn complete(&mut self, output: DatasetId, elapsed: Duration) {
        self.status = NodeStatus::Completed;
        self.output_dataset = Some(output);
        self.error = None;
        self.duration_ms = Some(duration_ms(elapsed));
        self.completed_at = Some(Utc::now());
    }

    /// Records a failed execution.
    pub fn fail(&mut self, error: impl Into<String>, elapsed: Duration) {
        self.status = NodeStatus::Failed;
        self.error = Some(error.into());
        self.duration_ms = Some(duration_ms(elapsed));
        self.completed_at = Some(Utc::now());
    }

    /// Summarizes the node's current state.
    #[must_use]
    pub fn outcome(&self) -> NodeOutcome {
        NodeOutcome {
            node_id: self.id,
            name: self.name.clone(),
            status: self.status,
            duration_ms: self.duration_ms,
            output_dataset: self.output_dataset,
            output_summary: None,
            error: self.error.clone(),
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_config_and_input() {
        let dataset = DatasetId::new();
        let node = NodeRecord::new(WorkflowId::new(), "smooth", "filter")
            .with_config(json!({ "cutoff": 50 }))
            .with_input(dataset);

        assert_eq!(node.status, NodeStatus::Pending);
        assert_eq!(node.operation_type, "filter");
        assert_eq!(node.operation_config["cutoff"], 50);
        assert_eq!(node.input_dataset, Some(dataset));
    }

    #[test]
    fn complete_records_output_and_timing() {
        let mut node = NodeRecord::new(WorkflowId::new(), "spectrum", "fft");
        node.start();
        assert_eq!(node.status, NodeStatus::Running);

        let output = DatasetId::new();
        node.complete(output, Duration::from_millis(42));
        assert_eq!(node.status, NodeStatus::Completed);
        assert_eq!(node.output_dataset, Some(output));
        assert_eq!(node.duration_ms, Some(42));
        assert!(node.completed_at.is_some());
        assert!(node.error.is_none());
    }

    #[test]
    fn reset_clears_previous_run() {
        let mut node = NodeRecord::new(WorkflowId::new(), "spectrum", "fft");
        node.start();
        node.fail("boom", Duration::from_millis(3));
        assert_eq!(node.error.as_deref(), Some("boom"));

        node.reset();
        assert_eq!(node.status, NodeStatus::Pending);
        assert!(node.error.is_none());
        assert!(node.duration_ms.is_none());
        assert!(node.output_dataset.is_none());
        assert!(node.completed_at.is_none());
    }

    #[test]
    fn outcome_mirrors_record() {
        let mut node = NodeRecord::new(WorkflowId::new(), "shift", "time_shift");
        node.fail("bad input", Duration::from_millis(1));
        let outcome = node.outcome();
        assert_eq!(outcome.node_id, node.id);
        assert_eq!(outcome.status, NodeStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("bad input"));
    }
}
