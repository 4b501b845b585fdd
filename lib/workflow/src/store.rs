//! Interfaces to the external stores the engine depends on.
//!
//! The engine only ever talks to persistence through these two traits.
//! In-memory implementations live in [`crate::memory`].

use crate::dataset::DatasetRecord;
use crate::definition::WorkflowRecord;
use crate::edge::EdgeRecord;
use crate::error::{DatasetStoreError, RepositoryError};
use crate::node::NodeRecord;
use async_trait::async_trait;
use sigflow_core::{DatasetId, WorkflowId};
use sigflow_timeseries::TimeSeriesDataset;

/// Id-addressable storage for datasets.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Loads a dataset by id.
    async fn load(&self, dataset_id: DatasetId) -> Result<TimeSeriesDataset, DatasetStoreError>;

    /// Persists a dataset and returns its new id.
    async fn save(&self, dataset: &TimeSeriesDataset) -> Result<DatasetId, DatasetStoreError>;
}

/// Storage for workflow, node, edge and dataset records.
///
/// Each update replaces a single record atomically; the engine never needs
/// a multi-record transaction.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Stores a new workflow.
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError>;

    async fn get_workflow(&self, workflow_id: WorkflowId)
    -> Result<WorkflowRecord, RepositoryError>;

    /// Lists all workflows, oldest first.
    async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>, RepositoryError>;

    /// Replaces a stored workflow record.
    async fn update_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError>;

    /// Stores `workflow` as running unless the stored copy already is.
    ///
    /// The check and the write happen atomically, so of two concurrent
    /// callers at most one succeeds. The other gets
    /// [`RepositoryError::WorkflowRunning`].
    async fn begin_run(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError>;

    /// Deletes a workflow together with its nodes and edges.
    ///
    /// Fails with [`RepositoryError::WorkflowRunning`] while the workflow is
    /// executing.
    async fn delete_workflow(&self, workflow_id: WorkflowId) -> Result<(), RepositoryError>;

    /// Adds a node to an existing workflow.
    async fn add_node(&self, node: &NodeRecord) -> Result<(), RepositoryError>;

    /// Lists a workflow's nodes, oldest first.
    async fn list_nodes(&self, workflow_id: WorkflowId)
    -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Replaces a stored node record.
    async fn update_node(&self, node: &NodeRecord) -> Result<(), RepositoryError>;

    /// Adds an edge between two nodes of the same workflow.
    ///
    /// Fails if either endpoint is missing or belongs to another workflow,
    /// or if the same `(workflow, from, to)` edge already exists.
    async fn add_edge(&self, edge: &EdgeRecord) -> Result<(), RepositoryError>;

    /// Lists a workflow's edges, oldest first.
    async fn list_edges(&self, workflow_id: WorkflowId)
    -> Result<Vec<EdgeRecord>, RepositoryError>;

    /// Records metadata for a dataset produced by a node.
    async fn record_dataset(&self, dataset: &DatasetRecord) -> Result<(), RepositoryError>;

    async fn get_dataset(&self, dataset_id: DatasetId) -> Result<DatasetRecord, RepositoryError>;
}
