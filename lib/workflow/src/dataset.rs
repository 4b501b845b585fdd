//! Metadata recorded for datasets produced by a run.

use crate::node::NodeRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigflow_core::{DatasetId, NodeId};
use sigflow_timeseries::DatasetSummary;

/// Descriptive record stored alongside a node's output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub name: String,
    /// The node whose output this is.
    pub source_node: Option<NodeId>,
    pub summary: DatasetSummary,
    pub created_at: DateTime<Utc>,
}

impl DatasetRecord {
    /// Describes the output `dataset_id` produced by `node`.
    #[must_use]
    pub fn node_output(dataset_id: DatasetId, node: &NodeRecord, summary: DatasetSummary) -> Self {
        Self {
            id: dataset_id,
            name: format!("Output of {} (node {})", node.operation_type, node.id),
            source_node: Some(node.id),
            summary,
            created_at: Utc::now(),
        }
    }
}
