//! Core types shared by every sigflow crate.
//!
//! This crate provides the strongly-typed identifiers used to relate
//! workflows, nodes, edges and datasets, the layered runtime configuration,
//! and the tracing subscriber bootstrap.

pub mod config;
pub mod id;
pub mod telemetry;

pub use config::{EngineConfig, SigflowConfig, StorageConfig};
pub use id::{DatasetId, EdgeId, NodeId, ParseIdError, WorkflowId, WorkflowRunId};
