//! Workflow graphs and their execution.
//!
//! A workflow is a directed acyclic graph of transform nodes. This crate
//! provides:
//!
//! - **Records**: workflows, nodes, edges and output datasets as stored by a
//!   [`MetadataRepository`]
//! - **Graph model**: a petgraph-backed view of one workflow's nodes and edges
//! - **Resolution**: deterministic topological ordering and input validation
//! - **Engine**: dependency-ordered execution with failure abort, optional
//!   branch parallelism and per-node deadlines
//! - **In-memory stores** for tests and embedding

pub mod dataset;
pub mod definition;
pub mod edge;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graph;
pub mod memory;
pub mod node;
pub mod resolver;
pub mod store;

pub use dataset::DatasetRecord;
pub use definition::WorkflowRecord;
pub use edge::EdgeRecord;
pub use engine::ExecutionEngine;
pub use error::{DatasetStoreError, EngineError, GraphError, NodeError, RepositoryError};
pub use execution::{NodeFailure, NodeOutcome, NodeStatus, RunReport, WorkflowStatus};
pub use graph::WorkflowGraph;
pub use memory::{InMemoryDatasetStore, InMemoryMetadataRepository};
pub use node::NodeRecord;
pub use resolver::{ReadinessTracker, execution_order, plan, validate_inputs};
pub use store::{DatasetStore, MetadataRepository};
