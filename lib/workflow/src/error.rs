//! Error types for the workflow crate.
//!
//! Errors are layered:
//! - `GraphError`: graph construction and validation
//! - `RepositoryError` / `DatasetStoreError`: the external stores
//! - `NodeError`: one node failed; recorded on the node, aborts the run
//! - `EngineError`: the run as a whole could not proceed

use sigflow_core::{DatasetId, NodeId, WorkflowId};
use sigflow_operations::OperationError;
use std::fmt;
use std::time::Duration;

/// Errors from building or validating a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge references a node that is not in the graph.
    NodeNotFound { node_id: NodeId },
    /// A node or edge belongs to a different workflow.
    ForeignRecord {
        workflow_id: WorkflowId,
        expected: WorkflowId,
    },
    /// The same `from -> to` edge was added twice.
    DuplicateEdge { from: NodeId, to: NodeId },
    /// The graph contains a cycle.
    Cycle { workflow_id: WorkflowId },
    /// A node has more than one incoming edge.
    MultipleInputs { node_id: NodeId, count: usize },
    /// A node with no incoming edge has no input dataset.
    MissingInputDataset { node_id: NodeId },
    /// A node with an incoming edge also names an input dataset.
    ConflictingInputDataset { node_id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::ForeignRecord {
                workflow_id,
                expected,
            } => {
                write!(f, "record belongs to workflow {workflow_id}, not {expected}")
            }
            Self::DuplicateEdge { from, to } => {
                write!(f, "edge {from} -> {to} already exists")
            }
            Self::Cycle { workflow_id } => {
                write!(f, "workflow {workflow_id} contains a cycle")
            }
            Self::MultipleInputs { node_id, count } => {
                write!(
                    f,
                    "node {node_id} has {count} incoming edges; at most one is supported"
                )
            }
            Self::MissingInputDataset { node_id } => {
                write!(f, "node {node_id} has no upstream node and no input dataset")
            }
            Self::ConflictingInputDataset { node_id } => {
                write!(
                    f,
                    "node {node_id} has an upstream node and must not name an input dataset"
                )
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from a [`MetadataRepository`](crate::store::MetadataRepository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    WorkflowNotFound { workflow_id: WorkflowId },
    NodeNotFound { node_id: NodeId },
    DatasetNotFound { dataset_id: DatasetId },
    /// The workflow is executing and cannot be modified or deleted.
    WorkflowRunning { workflow_id: WorkflowId },
    DuplicateEdge { from: NodeId, to: NodeId },
    /// An edge endpoint is missing or belongs to another workflow.
    InvalidEdge { reason: String },
    /// The backing store failed.
    Storage { message: String },
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::DatasetNotFound { dataset_id } => write!(f, "dataset not found: {dataset_id}"),
            Self::WorkflowRunning { workflow_id } => {
                write!(f, "workflow {workflow_id} is running")
            }
            Self::DuplicateEdge { from, to } => {
                write!(f, "edge {from} -> {to} already exists")
            }
            Self::InvalidEdge { reason } => write!(f, "invalid edge: {reason}"),
            Self::Storage { message } => write!(f, "metadata storage failed: {message}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Errors from a [`DatasetStore`](crate::store::DatasetStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStoreError {
    NotFound { dataset_id: DatasetId },
    /// Reading or writing the backing storage failed.
    Io { message: String },
    /// Stored bytes could not be encoded or decoded.
    Codec { message: String },
    /// The stored data uses a format version this build cannot read.
    UnsupportedVersion { version: u32 },
}

impl fmt::Display for DatasetStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { dataset_id } => write!(f, "dataset not found: {dataset_id}"),
            Self::Io { message } => write!(f, "dataset I/O failed: {message}"),
            Self::Codec { message } => write!(f, "dataset encoding failed: {message}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported dataset format version {version}")
            }
        }
    }
}

impl std::error::Error for DatasetStoreError {}

/// Failure of a single node. Recorded on the node and aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    /// The operation could not be constructed or executed.
    Operation(OperationError),
    /// The node's input dataset could not be loaded.
    DatasetUnavailable {
        dataset_id: DatasetId,
        source: DatasetStoreError,
    },
    /// The node's output could not be persisted.
    OutputNotSaved { source: DatasetStoreError },
    /// No upstream output was available for a chained node.
    MissingInput { node_id: NodeId },
    /// The node exceeded its deadline.
    Timeout { after: Duration },
    /// The transform panicked.
    Panicked { message: String },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(err) => write!(f, "{err}"),
            Self::DatasetUnavailable { dataset_id, source } => {
                write!(f, "input dataset {dataset_id} unavailable: {source}")
            }
            Self::OutputNotSaved { source } => write!(f, "failed to save output: {source}"),
            Self::MissingInput { node_id } => {
                write!(f, "no upstream output available for node {node_id}")
            }
            Self::Timeout { after } => {
                write!(f, "node timed out after {:.3}s", after.as_secs_f64())
            }
            Self::Panicked { message } => write!(f, "transform panicked: {message}"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation(err) => Some(err),
            Self::DatasetUnavailable { source, .. } | Self::OutputNotSaved { source } => {
                Some(source)
            }
            _ => None,
        }
    }
}

impl From<OperationError> for NodeError {
    fn from(err: OperationError) -> Self {
        Self::Operation(err)
    }
}

/// Errors that stop a workflow run as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    WorkflowNotFound { workflow_id: WorkflowId },
    /// The workflow is already executing.
    AlreadyRunning { workflow_id: WorkflowId },
    /// The workflow graph contains a cycle; no node was executed.
    GraphCycle { workflow_id: WorkflowId },
    /// The workflow graph is malformed; no node was executed.
    InvalidGraph {
        workflow_id: WorkflowId,
        source: GraphError,
    },
    /// Reading or writing workflow metadata failed.
    Repository(RepositoryError),
    /// A node task ended without reporting its result.
    Task { message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::AlreadyRunning { workflow_id } => {
                write!(f, "workflow {workflow_id} is already running")
            }
            Self::GraphCycle { workflow_id } => {
                write!(f, "workflow {workflow_id} contains a cycle")
            }
            Self::InvalidGraph {
                workflow_id,
                source,
            } => {
                write!(f, "workflow {workflow_id} is invalid: {source}")
            }
            Self::Repository(err) => write!(f, "{err}"),
            Self::Task { message } => write!(f, "node task failed: {message}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidGraph { source, .. } => Some(source),
            Self::Repository(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::WorkflowNotFound { workflow_id } => {
                Self::WorkflowNotFound { workflow_id }
            }
            RepositoryError::WorkflowRunning { workflow_id } => {
                Self::AlreadyRunning { workflow_id }
            }
            other => Self::Repository(other),
        }
    }
}

impl EngineError {
    /// Classifies a graph validation failure for `workflow_id`.
    #[must_use]
    pub fn from_graph(workflow_id: WorkflowId, err: GraphError) -> Self {
        match err {
            GraphError::Cycle { .. } => Self::GraphCycle { workflow_id },
            source => Self::InvalidGraph {
                workflow_id,
                source,
            },
        }
    }
}
