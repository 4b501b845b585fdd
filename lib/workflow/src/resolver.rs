//! Dependency resolution.
//!
//! Execution order is computed with Kahn's algorithm: nodes with no
//! unfinished predecessors are *ready*, and finishing a node decrements the
//! pending-input count of each successor. The ready set is ordered by node
//! id, so ties are always broken the same way and the order is
//! reproducible. The same [`ReadinessTracker`] drives both the static order
//! and the engine's incremental scheduling.

use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use sigflow_core::NodeId;
use std::collections::{BTreeSet, HashMap};

/// Tracks which nodes may run given the set of finished nodes.
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    /// Unfinished predecessor count for every node not yet ready.
    pending_inputs: HashMap<NodeId, usize>,
    successors: HashMap<NodeId, Vec<NodeId>>,
    ready: BTreeSet<NodeId>,
    finished: usize,
    total: usize,
}

impl ReadinessTracker {
    /// Creates a tracker where every node is unfinished.
    #[must_use]
    pub fn new(graph: &WorkflowGraph) -> Self {
        let mut pending_inputs = HashMap::new();
        let mut successors = HashMap::new();
        let mut ready = BTreeSet::new();

        for node_id in graph.node_ids() {
            let in_degree = graph.in_degree(node_id);
            if in_degree == 0 {
                ready.insert(node_id);
            } else {
                pending_inputs.insert(node_id, in_degree);
            }
            successors.insert(
                node_id,
                graph.successors(node_id).iter().map(|n| n.id).collect(),
            );
        }

        Self {
            pending_inputs,
            successors,
            ready,
            finished: 0,
            total: graph.node_count(),
        }
    }

    /// Removes and returns the ready node with the lowest id.
    pub fn take_ready(&mut self) -> Option<NodeId> {
        self.ready.pop_first()
    }

    /// Returns the nodes currently ready, lowest id first.
    #[must_use]
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        self.ready.iter().copied().collect()
    }

    /// Marks `node_id` finished and returns the successors it unblocked.
    pub fn complete(&mut self, node_id: NodeId) -> Vec<NodeId> {
        self.finished += 1;
        let mut unblocked = Vec::new();

        for successor in self.successors.get(&node_id).into_iter().flatten() {
            let Some(count) = self.pending_inputs.get_mut(successor) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending_inputs.remove(successor);
                self.ready.insert(*successor);
                unblocked.push(*successor);
            }
        }

        unblocked
    }

    /// Returns the number of nodes marked finished.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.finished
    }

    /// Returns true once every node has been marked finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished == self.total
    }
}

/// Computes a total order in which every node follows all of its
/// predecessors.
///
/// # Errors
///
/// Returns [`GraphError::Cycle`] if some nodes can never become ready. No
/// partial order is returned in that case.
pub fn execution_order(graph: &WorkflowGraph) -> Result<Vec<NodeId>, GraphError> {
    let mut tracker = ReadinessTracker::new(graph);
    let mut order = Vec::with_capacity(graph.node_count());

    while let Some(node_id) = tracker.take_ready() {
        tracker.complete(node_id);
        order.push(node_id);
    }

    if order.len() < graph.node_count() {
        return Err(GraphError::Cycle {
            workflow_id: graph.workflow_id(),
        });
    }
    Ok(order)
}

/// Checks that every node has exactly one input source.
///
/// Root nodes must name an input dataset; chained nodes must not, and may
/// have only a single upstream node.
///
/// # Errors
///
/// Returns the first violation found, in node id order.
pub fn validate_inputs(graph: &WorkflowGraph) -> Result<(), GraphError> {
    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by_key(|node| node.id);

    for node in nodes {
        match (graph.in_degree(node.id), node.input_dataset) {
            (0, None) => return Err(GraphError::MissingInputDataset { node_id: node.id }),
            (0, Some(_)) | (1, None) => {}
            (1, Some(_)) => {
                return Err(GraphError::ConflictingInputDataset { node_id: node.id });
            }
            (count, _) => {
                return Err(GraphError::MultipleInputs {
                    node_id: node.id,
                    count,
                });
            }
        }
    }
    Ok(())
}

/// Resolves the execution order and validates input sources.
///
/// Cycles are reported before input-source problems.
///
/// # Errors
///
/// Returns the first structural problem found.
pub fn plan(graph: &WorkflowGraph) -> Result<Vec<NodeId>, GraphError> {
    let order = execution_order(graph)?;
    validate_inputs(graph)?;
    Ok(order)
}
