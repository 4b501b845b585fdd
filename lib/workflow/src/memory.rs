//! In-memory store implementations.
//!
//! Records are kept in id-keyed maps guarded by an async mutex. Useful for
//! tests and for embedding the engine without external storage.

use crate::dataset::DatasetRecord;
use crate::definition::WorkflowRecord;
use crate::edge::EdgeRecord;
use crate::error::{DatasetStoreError, RepositoryError};
use crate::node::NodeRecord;
use crate::store::{DatasetStore, MetadataRepository};
use async_trait::async_trait;
use sigflow_core::{DatasetId, EdgeId, NodeId, WorkflowId};
use sigflow_timeseries::TimeSeriesDataset;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// Dataset store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryDatasetStore {
    datasets: Mutex<HashMap<DatasetId, TimeSeriesDataset>>,
}

impl InMemoryDatasetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `dataset` and returns its id.
    pub async fn insert(&self, dataset: TimeSeriesDataset) -> DatasetId {
        let dataset_id = DatasetId::new();
        self.datasets.lock().await.insert(dataset_id, dataset);
        dataset_id
    }

    /// Returns the number of stored datasets.
    pub async fn len(&self) -> usize {
        self.datasets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.datasets.lock().await.is_empty()
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    async fn load(&self, dataset_id: DatasetId) -> Result<TimeSeriesDataset, DatasetStoreError> {
        self.datasets
            .lock()
            .await
            .get(&dataset_id)
            .cloned()
            .ok_or(DatasetStoreError::NotFound { dataset_id })
    }

    async fn save(&self, dataset: &TimeSeriesDataset) -> Result<DatasetId, DatasetStoreError> {
        Ok(self.insert(dataset.clone()).await)
    }
}

#[derive(Debug, Default)]
struct Records {
    workflows: BTreeMap<WorkflowId, WorkflowRecord>,
    nodes: BTreeMap<NodeId, NodeRecord>,
    edges: BTreeMap<EdgeId, EdgeRecord>,
    datasets: BTreeMap<DatasetId, DatasetRecord>,
}

impl Records {
    fn workflow(&self, workflow_id: WorkflowId) -> Result<&WorkflowRecord, RepositoryError> {
        self.workflows
            .get(&workflow_id)
            .ok_or(RepositoryError::WorkflowNotFound { workflow_id })
    }

    fn endpoint(&self, edge: &EdgeRecord, node_id: NodeId) -> Result<(), RepositoryError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| RepositoryError::InvalidEdge {
                reason: format!("node {node_id} does not exist"),
            })?;
        if node.workflow_id != edge.workflow_id {
            return Err(RepositoryError::InvalidEdge {
                reason: format!(
                    "node {node_id} belongs to workflow {}, not {}",
                    node.workflow_id, edge.workflow_id
                ),
            });
        }
        Ok(())
    }
}

/// Metadata repository backed by ordered maps.
///
/// Ids are ULIDs, so map order is creation order.
#[derive(Debug, Default)]
pub struct InMemoryMetadataRepository {
    records: Mutex<Records>,
}

impl InMemoryMetadataRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .await
            .workflows
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<WorkflowRecord, RepositoryError> {
        self.records.lock().await.workflow(workflow_id).cloned()
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>, RepositoryError> {
        Ok(self.records.lock().await.workflows.values().cloned().collect())
    }

    async fn update_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        let stored = records.workflows.get_mut(&workflow.id).ok_or(
            RepositoryError::WorkflowNotFound {
                workflow_id: workflow.id,
            },
        )?;
        *stored = workflow.clone();
        Ok(())
    }

    async fn begin_run(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        let stored = records.workflows.get_mut(&workflow.id).ok_or(
            RepositoryError::WorkflowNotFound {
                workflow_id: workflow.id,
            },
        )?;
        if !stored.status.can_start() {
            return Err(RepositoryError::WorkflowRunning {
                workflow_id: workflow.id,
            });
        }
        *stored = workflow.clone();
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: WorkflowId) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        if records.workflow(workflow_id)?.is_running() {
            return Err(RepositoryError::WorkflowRunning { workflow_id });
        }

        records.workflows.remove(&workflow_id);
        records.nodes.retain(|_, node| node.workflow_id != workflow_id);
        records.edges.retain(|_, edge| edge.workflow_id != workflow_id);
        Ok(())
    }

    async fn add_node(&self, node: &NodeRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        records.workflow(node.workflow_id)?;
        records.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn list_nodes(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let records = self.records.lock().await;
        records.workflow(workflow_id)?;
        Ok(records
            .nodes
            .values()
            .filter(|node| node.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn update_node(&self, node: &NodeRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        let stored = records
            .nodes
            .get_mut(&node.id)
            .ok_or(RepositoryError::NodeNotFound { node_id: node.id })?;
        *stored = node.clone();
        Ok(())
    }

    async fn add_edge(&self, edge: &EdgeRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        records.workflow(edge.workflow_id)?;
        records.endpoint(edge, edge.from_node)?;
        records.endpoint(edge, edge.to_node)?;

        if records.edges.values().any(|existing| existing.same_endpoints(edge)) {
            return Err(RepositoryError::DuplicateEdge {
                from: edge.from_node,
                to: edge.to_node,
            });
        }

        records.edges.insert(edge.id, edge.clone());
        Ok(())
    }

    async fn list_edges(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<EdgeRecord>, RepositoryError> {
        let records = self.records.lock().await;
        records.workflow(workflow_id)?;
        Ok(records
            .edges
            .values()
            .filter(|edge| edge.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn record_dataset(&self, dataset: &DatasetRecord) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .await
            .datasets
            .insert(dataset.id, dataset.clone());
        Ok(())
    }

    async fn get_dataset(&self, dataset_id: DatasetId) -> Result<DatasetRecord, RepositoryError> {
        self.records
            .lock()
            .await
            .datasets
            .get(&dataset_id)
            .cloned()
            .ok_or(RepositoryError::DatasetNotFound { dataset_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn workflow_with_nodes(
        repo: &InMemoryMetadataRepository,
        count: usize,
    ) -> (WorkflowRecord, Vec<NodeRecord>) {
        let workflow = WorkflowRecord::new("pipeline");
        repo.create_workflow(&workflow).await.expect("create");
        let mut nodes = Vec::new();
        for i in 0..count {
            let node = NodeRecord::new(workflow.id, format!("n{i}"), "fft");
            repo.add_node(&node).await.expect("add node");
            nodes.push(node);
        }
        (workflow, nodes)
    }

    #[tokio::test]
    async fn dataset_store_roundtrip() {
        let store = InMemoryDatasetStore::new();
        let dataset = TimeSeriesDataset::from_samples(Vec::new());
        let id = store.save(&dataset).await.expect("save");

        assert_eq!(store.load(id).await.expect("load"), dataset);
        assert_eq!(store.len().await, 1);

        let missing = DatasetId::new();
        assert_eq!(
            store.load(missing).await,
            Err(DatasetStoreError::NotFound {
                dataset_id: missing
            })
        );
    }

    #[tokio::test]
    async fn nodes_require_existing_workflow() {
        let repo = InMemoryMetadataRepository::new();
        let node = NodeRecord::new(WorkflowId::new(), "orphan", "fft");
        assert!(matches!(
            repo.add_node(&node).await,
            Err(RepositoryError::WorkflowNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_edge_is_rejected() {
        let repo = InMemoryMetadataRepository::new();
        let (workflow, nodes) = workflow_with_nodes(&repo, 2).await;

        let edge = EdgeRecord::new(workflow.id, nodes[0].id, nodes[1].id);
        repo.add_edge(&edge).await.expect("first edge");

        let again = EdgeRecord::new(workflow.id, nodes[0].id, nodes[1].id);
        assert_eq!(
            repo.add_edge(&again).await,
            Err(RepositoryError::DuplicateEdge {
                from: nodes[0].id,
                to: nodes[1].id
            })
        );
        assert_eq!(repo.list_edges(workflow.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn edge_across_workflows_is_rejected() {
        let repo = InMemoryMetadataRepository::new();
        let (first, first_nodes) = workflow_with_nodes(&repo, 1).await;
        let (_, second_nodes) = workflow_with_nodes(&repo, 1).await;

        let edge = EdgeRecord::new(first.id, first_nodes[0].id, second_nodes[0].id);
        assert!(matches!(
            repo.add_edge(&edge).await,
            Err(RepositoryError::InvalidEdge { .. })
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_nodes_and_edges() {
        let repo = InMemoryMetadataRepository::new();
        let (workflow, nodes) = workflow_with_nodes(&repo, 2).await;
        let (kept, _) = workflow_with_nodes(&repo, 1).await;
        repo.add_edge(&EdgeRecord::new(workflow.id, nodes[0].id, nodes[1].id))
            .await
            .expect("edge");

        repo.delete_workflow(workflow.id).await.expect("delete");

        assert!(matches!(
            repo.get_workflow(workflow.id).await,
            Err(RepositoryError::WorkflowNotFound { .. })
        ));
        assert!(matches!(
            repo.update_node(&nodes[0]).await,
            Err(RepositoryError::NodeNotFound { .. })
        ));
        assert_eq!(repo.list_nodes(kept.id).await.expect("list").len(), 1);
        assert_eq!(repo.list_workflows().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn running_workflow_cannot_be_deleted() {
        let repo = InMemoryMetadataRepository::new();
        let (mut workflow, _) = workflow_with_nodes(&repo, 0).await;
        workflow.start();
        repo.update_workflow(&workflow).await.expect("update");

        assert_eq!(
            repo.delete_workflow(workflow.id).await,
            Err(RepositoryError::WorkflowRunning {
                workflow_id: workflow.id
            })
        );
    }

    #[tokio::test]
    async fn second_begin_run_is_refused() {
        let repo = InMemoryMetadataRepository::new();
        let (mut workflow, _) = workflow_with_nodes(&repo, 0).await;
        workflow.start();

        repo.begin_run(&workflow).await.expect("first start");
        assert_eq!(
            repo.begin_run(&workflow).await,
            Err(RepositoryError::WorkflowRunning {
                workflow_id: workflow.id
            })
        );

        workflow.complete();
        repo.update_workflow(&workflow).await.expect("update");
        workflow.start();
        repo.begin_run(&workflow).await.expect("restart after completion");
    }

    #[tokio::test]
    async fn dataset_records_roundtrip() {
        let repo = InMemoryMetadataRepository::new();
        let (_, nodes) = workflow_with_nodes(&repo, 1).await;
        let summary = TimeSeriesDataset::from_samples(Vec::new())
            .summary()
            .expect("summary");
        let record = DatasetRecord::node_output(DatasetId::new(), &nodes[0], summary);

        repo.record_dataset(&record).await.expect("record");
        assert_eq!(repo.get_dataset(record.id).await.expect("get"), record);

        let missing = DatasetId::new();
        assert_eq!(
            repo.get_dataset(missing).await,
            Err(RepositoryError::DatasetNotFound {
                dataset_id: missing
            })
        );
    }

    #[tokio::test]
    async fn nodes_are_listed_in_creation_order() {
        let repo = InMemoryMetadataRepository::new();
        let (workflow, nodes) = workflow_with_nodes(&repo, 3).await;
        let listed: Vec<_> = repo
            .list_nodes(workflow.id)
            .await
            .expect("list")
            .into_iter()
            .map(|n| n.id)
            .collect();
        let mut expected: Vec<_> = nodes.iter().map(|n| n.id).collect();
        expected.sort();
        assert_eq!(listed, expected);
    }
}
