//! Execution state types for workflows and nodes.
//!
//! A workflow moves `draft -> running -> {completed | failed}` and may be
//! run again from `completed` or `failed`. Each run resets every node to
//! `pending`; a node then moves `pending -> running -> {completed | failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigflow_core::{DatasetId, NodeId, WorkflowId, WorkflowRunId};
use sigflow_timeseries::DatasetSummary;
use std::fmt;

/// Lifecycle state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but never run.
    #[default]
    Draft,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Returns true if a run may start from this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        !matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the string form produced by [`Self::as_str`].
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a node within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl NodeStatus {
    /// Returns true if the node has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the string form produced by [`Self::as_str`].
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one node after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub node_id: NodeId,
    pub name: String,
    pub status: NodeStatus,
    pub duration_ms: Option<u64>,
    pub output_dataset: Option<DatasetId>,
    /// Shape of the output dataset, for completed nodes.
    pub output_summary: Option<DatasetSummary>,
    pub error: Option<String>,
}

/// The node that stopped a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: NodeId,
    pub node_name: String,
    pub message: String,
}

/// Summary of a finished workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    /// Number of nodes that completed successfully.
    pub nodes_executed: usize,
    /// Outcomes of every node that ran, in the order they finished.
    pub nodes: Vec<NodeOutcome>,
    pub failure: Option<NodeFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Returns true if every node completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Returns the wall-clock duration of the run in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Returns the outcome recorded for `node_id`, if it ran.
    #[must_use]
    pub fn outcome(&self, node_id: NodeId) -> Option<&NodeOutcome> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}
