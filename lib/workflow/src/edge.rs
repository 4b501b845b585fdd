//! Edge records.

use serde::{Deserialize, Serialize};
use sigflow_core::{EdgeId, NodeId, WorkflowId};

/// A directed `from_node -> to_node` dependency: `to_node` consumes the
/// output of `from_node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub workflow_id: WorkflowId,
    pub from_node: NodeId,
    pub to_node: NodeId,
}

impl EdgeRecord {
    /// Creates a new edge.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, from_node: NodeId, to_node: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            workflow_id,
            from_node,
            to_node,
        }
    }

    /// Returns true if this edge connects the same pair of nodes as `other`.
    #[must_use]
    pub fn same_endpoints(&self, other: &Self) -> bool {
        self.workflow_id == other.workflow_id
            && self.from_node == other.from_node
            && self.to_node == other.to_node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_endpoints_ignores_edge_id() {
        let workflow = WorkflowId::new();
        let (a, b) = (NodeId::new(), NodeId::new());

        let first = EdgeRecord::new(workflow, a, b);
        let second = EdgeRecord::new(workflow, a, b);
        assert_ne!(first.id, second.id);
        assert!(first.same_endpoints(&second));
        assert!(!first.same_endpoints(&EdgeRecord::new(workflow, b, a)));
    }
}
