//! Workflow execution engine.
//!
//! A run proceeds as follows:
//! 1. Mark the workflow running, refusing if it already is
//! 2. Build the graph and validate it; a cycle or malformed graph fails the
//!    workflow before any node is touched
//! 3. Reset every node to pending
//! 4. Execute ready nodes, at most `max_parallel_nodes` at a time, each node
//!    reading either its stored input dataset or its predecessor's output
//! 5. Stop scheduling on the first node failure and wait for in-flight nodes
//! 6. Mark the workflow completed or failed and return a [`RunReport`]
//!
//! Each completed node's output is saved to the dataset store and described
//! by a [`DatasetRecord`] in the metadata repository. If the repository
//! fails mid-run, nodes still marked running are marked failed before the
//! error is returned.
//!
//! Transforms are CPU-bound and run on the blocking thread pool.

use crate::dataset::DatasetRecord;
use crate::error::{EngineError, GraphError, NodeError};
use crate::execution::{NodeFailure, NodeOutcome, NodeStatus, RunReport, WorkflowStatus};
use crate::graph::WorkflowGraph;
use crate::node::NodeRecord;
use crate::resolver::{self, ReadinessTracker};
use crate::store::{DatasetStore, MetadataRepository};
use chrono::Utc;
use serde_json::Value as JsonValue;
use sigflow_core::{DatasetId, EngineConfig, NodeId, WorkflowId, WorkflowRunId};
use sigflow_operations::{OperationError, OperationRegistry};
use sigflow_timeseries::{DatasetSummary, TimeSeriesDataset};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Executes workflows against a dataset store and a metadata repository.
pub struct ExecutionEngine<D, M> {
    datasets: Arc<D>,
    metadata: Arc<M>,
    registry: Arc<OperationRegistry>,
    parallelism: usize,
    node_timeout: Option<Duration>,
}

/// Where a node's input comes from.
enum NodeInput {
    Stored(DatasetId),
    Upstream(Arc<TimeSeriesDataset>),
    Missing(NodeId),
}

/// A node's saved output.
struct NodeOutput {
    dataset_id: DatasetId,
    dataset: Arc<TimeSeriesDataset>,
    summary: DatasetSummary,
}

/// Result of one node task.
struct NodeRun {
    node_id: NodeId,
    elapsed: Duration,
    result: Result<NodeOutput, NodeError>,
}

/// What the scheduling loop produced.
struct Execution {
    outcomes: Vec<NodeOutcome>,
    failure: Option<NodeFailure>,
}

impl<D, M> ExecutionEngine<D, M>
where
    D: DatasetStore + 'static,
    M: MetadataRepository + 'static,
{
    /// Creates an engine with the standard operations and default settings.
    pub fn new(datasets: Arc<D>, metadata: Arc<M>) -> Self {
        Self {
            datasets,
            metadata,
            registry: Arc::new(OperationRegistry::standard()),
            parallelism: 1,
            node_timeout: None,
        }
    }

    /// Replaces the operation registry.
    #[must_use]
    pub fn with_registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Applies parallelism and timeout settings.
    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.parallelism = config.parallelism();
        self.node_timeout = config.node_timeout();
        self
    }

    /// Sets the per-node deadline.
    #[must_use]
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Sets how many nodes may execute at once. Zero is treated as one.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Runs a workflow to completion.
    ///
    /// A node failure does not produce an error: the workflow is marked
    /// failed and the failure is described in the returned report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] if the workflow is executing,
    /// [`EngineError::GraphCycle`] or [`EngineError::InvalidGraph`] if the
    /// graph cannot be executed, and [`EngineError::Repository`] if metadata
    /// could not be read or written. The workflow is marked failed in every
    /// case except the first.
    #[tracing::instrument(skip_all, fields(%workflow_id))]
    pub async fn run(&self, workflow_id: WorkflowId) -> Result<RunReport, EngineError> {
        let mut workflow = self.metadata.get_workflow(workflow_id).await?;
        let run_id = WorkflowRunId::new();
        let started_at = Utc::now();
        workflow.start();
        // Conditional on the stored status, so concurrent callers start once.
        self.metadata.begin_run(&workflow).await?;
        tracing::info!(%run_id, workflow = %workflow.name, "workflow run started");

        let execution = match self.execute(workflow_id).await {
            Ok(execution) => execution,
            Err(err) => {
                tracing::error!(%run_id, error = %err, "workflow run aborted");
                workflow.fail();
                if let Err(update_err) = self.metadata.update_workflow(&workflow).await {
                    tracing::warn!(
                        %run_id,
                        error = %update_err,
                        "failed to mark workflow as failed"
                    );
                }
                return Err(err);
            }
        };

        if execution.failure.is_some() {
            workflow.fail();
        } else {
            workflow.complete();
        }
        self.metadata.update_workflow(&workflow).await?;

        let report = RunReport {
            run_id,
            workflow_id,
            status: workflow.status,
            nodes_executed: execution
                .outcomes
                .iter()
                .filter(|outcome| outcome.status == NodeStatus::Completed)
                .count(),
            nodes: execution.outcomes,
            failure: execution.failure,
            started_at,
            finished_at: workflow.completed_at.unwrap_or_else(Utc::now),
        };

        match report.status {
            WorkflowStatus::Completed => tracing::info!(
                %run_id,
                nodes_executed = report.nodes_executed,
                duration_ms = report.duration_ms(),
                "workflow run completed"
            ),
            _ => tracing::warn!(
                %run_id,
                nodes_executed = report.nodes_executed,
                duration_ms = report.duration_ms(),
                "workflow run failed"
            ),
        }

        Ok(report)
    }

    async fn execute(&self, workflow_id: WorkflowId) -> Result<Execution, EngineError> {
        let nodes = self.metadata.list_nodes(workflow_id).await?;
        let edges = self.metadata.list_edges(workflow_id).await?;
        let graph = WorkflowGraph::from_records(workflow_id, nodes, edges)
            .map_err(|err| EngineError::from_graph(workflow_id, err))?;
        let order =
            resolver::plan(&graph).map_err(|err| EngineError::from_graph(workflow_id, err))?;
        tracing::debug!(node_count = order.len(), "execution plan resolved");

        let mut records: BTreeMap<NodeId, NodeRecord> = graph
            .nodes()
            .map(|node| (node.id, node.clone()))
            .collect();
        for node in records.values_mut() {
            node.reset();
            self.metadata.update_node(node).await?;
        }

        let mut in_flight = HashMap::new();
        match self.schedule(&graph, &mut records, &mut in_flight).await {
            Ok(execution) => Ok(execution),
            Err(err) => {
                self.abandon(&mut records, in_flight, &err).await;
                Err(err)
            }
        }
    }

    /// Executes ready nodes until the graph is exhausted or a node fails.
    ///
    /// `in_flight` holds every node marked running whose terminal state has
    /// not been stored yet.
    async fn schedule(
        &self,
        graph: &WorkflowGraph,
        records: &mut BTreeMap<NodeId, NodeRecord>,
        in_flight: &mut HashMap<NodeId, Instant>,
    ) -> Result<Execution, EngineError> {
        let workflow_id = graph.workflow_id();
        let mut tracker = ReadinessTracker::new(graph);
        let mut consumers: HashMap<NodeId, usize> = graph
            .node_ids()
            .map(|node_id| (node_id, graph.successors(node_id).len()))
            .collect();
        let mut outputs: HashMap<NodeId, Arc<TimeSeriesDataset>> = HashMap::new();
        let mut tasks = JoinSet::new();
        let mut execution = Execution {
            outcomes: Vec::new(),
            failure: None,
        };

        loop {
            while execution.failure.is_none() && tasks.len() < self.parallelism {
                let Some(node_id) = tracker.take_ready() else {
                    break;
                };
                let node = record_mut(records, workflow_id, node_id)?;
                let input = take_input(graph, node, &mut outputs, &mut consumers);

                in_flight.insert(node_id, Instant::now());
                node.start();
                self.metadata.update_node(node).await?;
                tracing::info!(
                    %node_id,
                    node = %node.name,
                    operation = %node.operation_type,
                    "node started"
                );
                tasks.spawn(self.node_task(node, input));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let NodeRun {
                node_id,
                elapsed,
                result,
            } = joined.map_err(|err| EngineError::Task {
                message: err.to_string(),
            })?;

            let node = record_mut(records, workflow_id, node_id)?;
            let mut summary = None;
            match result {
                Ok(output) => {
                    let dataset =
                        DatasetRecord::node_output(output.dataset_id, node, output.summary);
                    self.metadata.record_dataset(&dataset).await?;
                    node.complete(output.dataset_id, elapsed);
                    tracing::info!(
                        %node_id,
                        node = %node.name,
                        output_dataset = %output.dataset_id,
                        rows = dataset.summary.row_count,
                        duration_ms = node.duration_ms,
                        "node completed"
                    );
                    if consumers.get(&node_id).is_some_and(|count| *count > 0) {
                        outputs.insert(node_id, output.dataset);
                    }
                    tracker.complete(node_id);
                    summary = Some(dataset.summary);
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::error!(%node_id, node = %node.name, error = %message, "node failed");
                    node.fail(message.clone(), elapsed);
                    if execution.failure.is_none() {
                        execution.failure = Some(NodeFailure {
                            node_id,
                            node_name: node.name.clone(),
                            message,
                        });
                    }
                }
            }
            self.metadata.update_node(node).await?;
            in_flight.remove(&node_id);
            execution.outcomes.push(NodeOutcome {
                output_summary: summary,
                ..node.outcome()
            });
        }

        Ok(execution)
    }

    /// Marks nodes left running by an aborted run as failed.
    ///
    /// Store errors here are logged, not returned.
    async fn abandon(
        &self,
        records: &mut BTreeMap<NodeId, NodeRecord>,
        in_flight: HashMap<NodeId, Instant>,
        err: &EngineError,
    ) {
        for (node_id, started) in in_flight {
            let Some(node) = records.get_mut(&node_id) else {
                continue;
            };
            node.fail(format!("run aborted: {err}"), started.elapsed());
            if let Err(update_err) = self.metadata.update_node(node).await {
                tracing::warn!(
                    %node_id,
                    error = %update_err,
                    "failed to mark abandoned node as failed"
                );
            }
        }
    }

    fn node_task(
        &self,
        node: &NodeRecord,
        input: NodeInput,
    ) -> impl Future<Output = NodeRun> + Send + 'static {
        let datasets = Arc::clone(&self.datasets);
        let registry = Arc::clone(&self.registry);
        let timeout = self.node_timeout;
        let node_id = node.id;
        let operation_type = node.operation_type.clone();
        let config = node.operation_config.clone();

        async move {
            let started = Instant::now();
            let work = run_node(datasets, registry, operation_type, config, input);
            let result = match timeout {
                Some(after) => tokio::time::timeout(after, work)
                    .await
                    .unwrap_or_else(|_| Err(NodeError::Timeout { after })),
                None => work.await,
            };
            NodeRun {
                node_id,
                elapsed: started.elapsed(),
                result,
            }
        }
    }
}

fn record_mut(
    records: &mut BTreeMap<NodeId, NodeRecord>,
    workflow_id: WorkflowId,
    node_id: NodeId,
) -> Result<&mut NodeRecord, EngineError> {
    records
        .get_mut(&node_id)
        .ok_or_else(|| EngineError::from_graph(workflow_id, GraphError::NodeNotFound { node_id }))
}

/// Picks the input for `node`, handing over the predecessor's output.
///
/// An upstream output is released once its last consumer has taken it.
fn take_input(
    graph: &WorkflowGraph,
    node: &NodeRecord,
    outputs: &mut HashMap<NodeId, Arc<TimeSeriesDataset>>,
    consumers: &mut HashMap<NodeId, usize>,
) -> NodeInput {
    let Some(upstream) = graph.predecessors(node.id).first().map(|n| n.id) else {
        return node
            .input_dataset
            .map_or(NodeInput::Missing(node.id), NodeInput::Stored);
    };

    let remaining = consumers.entry(upstream).or_default();
    *remaining = remaining.saturating_sub(1);
    let output = if *remaining == 0 {
        outputs.remove(&upstream)
    } else {
        outputs.get(&upstream).cloned()
    };

    output.map_or(NodeInput::Missing(node.id), NodeInput::Upstream)
}

async fn run_node<D: DatasetStore>(
    datasets: Arc<D>,
    registry: Arc<OperationRegistry>,
    operation_type: String,
    config: JsonValue,
    input: NodeInput,
) -> Result<NodeOutput, NodeError> {
    let operation = registry.create(&operation_type, &config)?;

    let input = match input {
        NodeInput::Stored(dataset_id) => Arc::new(
            datasets
                .load(dataset_id)
                .await
                .map_err(|source| NodeError::DatasetUnavailable { dataset_id, source })?,
        ),
        NodeInput::Upstream(dataset) => dataset,
        NodeInput::Missing(node_id) => return Err(NodeError::MissingInput { node_id }),
    };

    let (output, summary) = tokio::task::spawn_blocking(move || {
        let output = operation.execute(&input)?;
        let summary = output
            .summary()
            .map_err(OperationError::data(operation.operation_type()))?;
        Ok::<_, OperationError>((output, summary))
    })
    .await
    .map_err(|err| NodeError::Panicked {
        message: err.to_string(),
    })??;

    let dataset_id = datasets
        .save(&output)
        .await
        .map_err(|source| NodeError::OutputNotSaved { source })?;
    Ok(NodeOutput {
        dataset_id,
        dataset: Arc::new(output),
        summary,
    })
}
