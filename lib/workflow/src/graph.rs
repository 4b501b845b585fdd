//! Workflow graph built on petgraph.
//!
//! The graph is assembled from the node and edge records of one workflow.
//! Node weights are the records themselves; edge weights are edge ids.

use crate::edge::EdgeRecord;
use crate::error::GraphError;
use crate::node::NodeRecord;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use sigflow_core::{EdgeId, NodeId, WorkflowId};
use std::collections::HashMap;

/// In-memory view of a workflow's nodes and directed edges.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    workflow_id: WorkflowId,
    graph: DiGraph<NodeRecord, EdgeId>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates an empty graph for `workflow_id`.
    #[must_use]
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Builds a graph from stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if a record belongs to another workflow, an edge
    /// references an unknown node, or an edge is duplicated.
    pub fn from_records(
        workflow_id: WorkflowId,
        nodes: impl IntoIterator<Item = NodeRecord>,
        edges: impl IntoIterator<Item = EdgeRecord>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new(workflow_id);
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge in edges {
            graph.add_edge(&edge)?;
        }
        Ok(graph)
    }

    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ForeignRecord`] if the node belongs to another
    /// workflow.
    pub fn add_node(&mut self, node: NodeRecord) -> Result<NodeId, GraphError> {
        self.check_owner(node.workflow_id)?;
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        Ok(node_id)
    }

    /// Adds a directed edge between two nodes already in the graph.
    ///
    /// Self-loops are accepted here; they surface as cycles during
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge belongs to another workflow, either
    /// endpoint is unknown, or the same edge already exists.
    pub fn add_edge(&mut self, edge: &EdgeRecord) -> Result<(), GraphError> {
        self.check_owner(edge.workflow_id)?;
        let source = self.index_of(edge.from_node)?;
        let target = self.index_of(edge.to_node)?;

        if self.graph.contains_edge(source, target) {
            return Err(GraphError::DuplicateEdge {
                from: edge.from_node,
                to: edge.to_node,
            });
        }

        self.graph.add_edge(source, target, edge.id);
        Ok(())
    }

    fn check_owner(&self, workflow_id: WorkflowId) -> Result<(), GraphError> {
        if workflow_id == self.workflow_id {
            Ok(())
        } else {
            Err(GraphError::ForeignRecord {
                workflow_id,
                expected: self.workflow_id,
            })
        }
    }

    fn index_of(&self, node_id: NodeId) -> Result<NodeIndex, GraphError> {
        self.node_index_map
            .get(&node_id)
            .copied()
            .ok_or(GraphError::NodeNotFound { node_id })
    }

    /// Returns all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph.node_weights()
    }

    /// Returns all node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().map(|node| node.id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the upstream nodes of `node_id`.
    #[must_use]
    pub fn predecessors(&self, node_id: NodeId) -> Vec<&NodeRecord> {
        self.neighbors(node_id, Direction::Incoming)
    }

    /// Returns the downstream nodes of `node_id`.
    #[must_use]
    pub fn successors(&self, node_id: NodeId) -> Vec<&NodeRecord> {
        self.neighbors(node_id, Direction::Outgoing)
    }

    fn neighbors(&self, node_id: NodeId, direction: Direction) -> Vec<&NodeRecord> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, direction)
            .filter_map(|neighbor| self.graph.node_weight(neighbor))
            .collect()
    }

    /// Returns the number of edges into `node_id`.
    #[must_use]
    pub fn in_degree(&self, node_id: NodeId) -> usize {
        self.node_index_map.get(&node_id).map_or(0, |&index| {
            self.graph
                .neighbors_directed(index, Direction::Incoming)
                .count()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(workflow_id: WorkflowId, name: &str) -> NodeRecord {
        NodeRecord::new(workflow_id, name, "fft")
    }

    #[test]
    fn add_nodes_and_edges() {
        let workflow_id = WorkflowId::new();
        let a = node(workflow_id, "a");
        let b = node(workflow_id, "b");
        let (a_id, b_id) = (a.id, b.id);

        let graph = WorkflowGraph::from_records(
            workflow_id,
            [a, b],
            [EdgeRecord::new(workflow_id, a_id, b_id)],
        )
        .expect("valid graph");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.successors(a_id)[0].id, b_id);
        assert_eq!(graph.predecessors(b_id)[0].id, a_id);
        assert_eq!(graph.in_degree(b_id), 1);
        assert_eq!(graph.in_degree(a_id), 0);
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let workflow_id = WorkflowId::new();
        let a = node(workflow_id, "a");
        let a_id = a.id;
        let missing = NodeId::new();

        let err = WorkflowGraph::from_records(
            workflow_id,
            [a],
            [EdgeRecord::new(workflow_id, a_id, missing)],
        )
        .unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound { node_id: missing });
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let workflow_id = WorkflowId::new();
        let a = node(workflow_id, "a");
        let b = node(workflow_id, "b");
        let (a_id, b_id) = (a.id, b.id);

        let mut graph = WorkflowGraph::from_records(workflow_id, [a, b], []).expect("nodes");
        graph
            .add_edge(&EdgeRecord::new(workflow_id, a_id, b_id))
            .expect("first edge");
        let err = graph
            .add_edge(&EdgeRecord::new(workflow_id, a_id, b_id))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateEdge { from: a_id, to: b_id });
    }

    #[test]
    fn records_from_other_workflows_are_rejected() {
        let workflow_id = WorkflowId::new();
        let other = WorkflowId::new();

        let mut graph = WorkflowGraph::new(workflow_id);
        let err = graph.add_node(node(other, "stray")).unwrap_err();
        assert!(matches!(err, GraphError::ForeignRecord { .. }));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let workflow_id = WorkflowId::new();
        let a = node(workflow_id, "a");
        let a_id = a.id;
        let graph = WorkflowGraph::from_records(
            workflow_id,
            [a],
            [EdgeRecord::new(workflow_id, a_id, a_id)],
        )
        .expect("self loop is structurally valid");
        assert_eq!(
            crate::resolver::execution_order(&graph),
            Err(GraphError::Cycle { workflow_id })
        );
    }
}
