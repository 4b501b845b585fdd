//! SQLite-backed metadata repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sigflow_core::{DatasetId, NodeId, StorageConfig, WorkflowId};
use sigflow_timeseries::{DatasetSummary, Domain};
use sigflow_workflow::{
    DatasetRecord, EdgeRecord, MetadataRepository, NodeRecord, NodeStatus, RepositoryError,
    WorkflowRecord, WorkflowStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// Stores workflows, nodes, edges and dataset records in SQLite.
///
/// Deleting a workflow cascades to its nodes and edges, and the
/// `(workflow_id, from_node_id, to_node_id)` triple is unique. Dataset
/// records outlive the workflow that produced them.
#[derive(Debug, Clone)]
pub struct SqliteMetadataRepository {
    pool: SqlitePool,
}

impl SqliteMetadataRepository {
    /// Connects to `database_url`, creating the database file if needed,
    /// and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] if the connection or a migration
    /// fails.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage)?;
        Self::from_pool(pool).await
    }

    /// Connects to the configured database.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] if the connection or a migration
    /// fails.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, RepositoryError> {
        Self::connect(&config.database_url).await
    }

    /// Wraps an existing pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] if a migration fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, RepositoryError> {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| RepositoryError::Storage {
                message: err.to_string(),
            })?;
        Ok(Self { pool })
    }

    async fn fetch_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowRecord>, RepositoryError> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, status, created_at, updated_at, completed_at
            FROM workflows
            WHERE id = ?1
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(WorkflowRow::try_into_record).transpose()
    }

    async fn require_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<WorkflowRecord, RepositoryError> {
        self.fetch_workflow(workflow_id)
            .await?
            .ok_or(RepositoryError::WorkflowNotFound { workflow_id })
    }

    /// Returns the workflow owning `node_id`, if the node exists.
    async fn node_workflow(&self, node_id: NodeId) -> Result<Option<WorkflowId>, RepositoryError> {
        let workflow_id: Option<String> =
            sqlx::query_scalar("SELECT workflow_id FROM nodes WHERE id = ?1")
                .bind(node_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        workflow_id.as_deref().map(parse_id).transpose()
    }

    async fn check_endpoint(
        &self,
        edge: &EdgeRecord,
        node_id: NodeId,
    ) -> Result<(), RepositoryError> {
        match self.node_workflow(node_id).await? {
            None => Err(RepositoryError::InvalidEdge {
                reason: format!("node {node_id} does not exist"),
            }),
            Some(owner) if owner != edge.workflow_id => Err(RepositoryError::InvalidEdge {
                reason: format!(
                    "node {node_id} belongs to workflow {owner}, not {}",
                    edge.workflow_id
                ),
            }),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id))]
    async fn create_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, name, description, status, created_at, updated_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.status.as_str())
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .bind(workflow.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn get_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<WorkflowRecord, RepositoryError> {
        self.require_workflow(workflow_id).await
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>, RepositoryError> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, status, created_at, updated_at, completed_at
            FROM workflows
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(WorkflowRow::try_into_record).collect()
    }

    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id, status = %workflow.status))]
    async fn update_workflow(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = ?2, description = ?3, status = ?4, updated_at = ?5, completed_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.status.as_str())
        .bind(workflow.updated_at)
        .bind(workflow.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::WorkflowNotFound {
                workflow_id: workflow.id,
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id))]
    async fn begin_run(&self, workflow: &WorkflowRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = ?2, description = ?3, status = ?4, updated_at = ?5, completed_at = ?6
            WHERE id = ?1 AND status != 'running'
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.status.as_str())
        .bind(workflow.updated_at)
        .bind(workflow.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            // Either missing or already running.
            self.require_workflow(workflow.id).await?;
            return Err(RepositoryError::WorkflowRunning {
                workflow_id: workflow.id,
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(%workflow_id))]
    async fn delete_workflow(&self, workflow_id: WorkflowId) -> Result<(), RepositoryError> {
        if self.require_workflow(workflow_id).await?.is_running() {
            return Err(RepositoryError::WorkflowRunning { workflow_id });
        }

        sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(workflow_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        tracing::info!("deleted workflow");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(node_id = %node.id, workflow_id = %node.workflow_id))]
    async fn add_node(&self, node: &NodeRecord) -> Result<(), RepositoryError> {
        self.require_workflow(node.workflow_id).await?;

        sqlx::query(
            r#"
            INSERT INTO nodes
                (id, workflow_id, name, operation_type, operation_config, input_dataset_id,
                 output_dataset_id, status, error, duration_ms, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(node.id.to_string())
        .bind(node.workflow_id.to_string())
        .bind(&node.name)
        .bind(&node.operation_type)
        .bind(node.operation_config.to_string())
        .bind(node.input_dataset.map(|id| id.to_string()))
        .bind(node.output_dataset.map(|id| id.to_string()))
        .bind(node.status.as_str())
        .bind(&node.error)
        .bind(node.duration_ms.map(to_i64))
        .bind(node.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn list_nodes(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        self.require_workflow(workflow_id).await?;

        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, name, operation_type, operation_config, input_dataset_id,
                   output_dataset_id, status, error, duration_ms, completed_at
            FROM nodes
            WHERE workflow_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(NodeRow::try_into_record).collect()
    }

    #[tracing::instrument(skip_all, fields(node_id = %node.id, status = %node.status))]
    async fn update_node(&self, node: &NodeRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE nodes
            SET name = ?2, operation_type = ?3, operation_config = ?4, input_dataset_id = ?5,
                output_dataset_id = ?6, status = ?7, error = ?8, duration_ms = ?9,
                completed_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(node.id.to_string())
        .bind(&node.name)
        .bind(&node.operation_type)
        .bind(node.operation_config.to_string())
        .bind(node.input_dataset.map(|id| id.to_string()))
        .bind(node.output_dataset.map(|id| id.to_string()))
        .bind(node.status.as_str())
        .bind(&node.error)
        .bind(node.duration_ms.map(to_i64))
        .bind(node.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NodeNotFound { node_id: node.id });
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(from = %edge.from_node, to = %edge.to_node))]
    async fn add_edge(&self, edge: &EdgeRecord) -> Result<(), RepositoryError> {
        self.require_workflow(edge.workflow_id).await?;
        self.check_endpoint(edge, edge.from_node).await?;
        self.check_endpoint(edge, edge.to_node).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO edges (id, workflow_id, from_node_id, to_node_id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(edge.id.to_string())
        .bind(edge.workflow_id.to_string())
        .bind(edge.from_node.to_string())
        .bind(edge.to_node.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation()) =>
            {
                Err(RepositoryError::DuplicateEdge {
                    from: edge.from_node,
                    to: edge.to_node,
                })
            }
            Err(err) => Err(storage(err)),
        }
    }

    async fn list_edges(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<EdgeRecord>, RepositoryError> {
        self.require_workflow(workflow_id).await?;

        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, from_node_id, to_node_id
            FROM edges
            WHERE workflow_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(EdgeRow::try_into_record).collect()
    }

    #[tracing::instrument(skip_all, fields(dataset_id = %dataset.id))]
    async fn record_dataset(&self, dataset: &DatasetRecord) -> Result<(), RepositoryError> {
        let summary = &dataset.summary;
        sqlx::query(
            r#"
            INSERT INTO datasets
                (id, name, source_node_id, domain, row_count, channel_count, start_time,
                 end_time, sample_rate, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(dataset.id.to_string())
        .bind(&dataset.name)
        .bind(dataset.source_node.map(|id| id.to_string()))
        .bind(summary.domain.as_str())
        .bind(count_to_i64(summary.row_count))
        .bind(count_to_i64(summary.channel_count))
        .bind(summary.start_time)
        .bind(summary.end_time)
        .bind(summary.sample_rate)
        .bind(dataset.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn get_dataset(&self, dataset_id: DatasetId) -> Result<DatasetRecord, RepositoryError> {
        let row: Option<DatasetRow> = sqlx::query_as(
            r#"
            SELECT id, name, source_node_id, domain, row_count, channel_count, start_time,
                   end_time, sample_rate, created_at
            FROM datasets
            WHERE id = ?1
            "#,
        )
        .bind(dataset_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.ok_or(RepositoryError::DatasetNotFound { dataset_id })?
            .try_into_record()
    }
}

#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRow {
    fn try_into_record(self) -> Result<WorkflowRecord, RepositoryError> {
        let status = WorkflowStatus::from_str_value(&self.status)
            .ok_or_else(|| corrupt(format!("unknown workflow status '{}'", self.status)))?;

        Ok(WorkflowRecord {
            id: parse_id(&self.id)?,
            name: self.name,
            description: self.description,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct NodeRow {
    id: String,
    workflow_id: String,
    name: String,
    operation_type: String,
    operation_config: String,
    input_dataset_id: Option<String>,
    output_dataset_id: Option<String>,
    status: String,
    error: Option<String>,
    duration_ms: Option<i64>,
    completed_at: Option<DateTime<Utc>>,
}

impl NodeRow {
    fn try_into_record(self) -> Result<NodeRecord, RepositoryError> {
        let status = NodeStatus::from_str_value(&self.status)
            .ok_or_else(|| corrupt(format!("unknown node status '{}'", self.status)))?;
        let operation_config = serde_json::from_str(&self.operation_config)
            .map_err(|err| corrupt(format!("invalid operation config: {err}")))?;

        Ok(NodeRecord {
            id: parse_id(&self.id)?,
            workflow_id: parse_id(&self.workflow_id)?,
            name: self.name,
            operation_type: self.operation_type,
            operation_config,
            input_dataset: self
                .input_dataset_id
                .as_deref()
                .map(parse_id::<DatasetId>)
                .transpose()?,
            output_dataset: self
                .output_dataset_id
                .as_deref()
                .map(parse_id::<DatasetId>)
                .transpose()?,
            status,
            error: self.error,
            duration_ms: self.duration_ms.map(|ms| u64::try_from(ms).unwrap_or(0)),
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct EdgeRow {
    id: String,
    workflow_id: String,
    from_node_id: String,
    to_node_id: String,
}

impl EdgeRow {
    fn try_into_record(self) -> Result<EdgeRecord, RepositoryError> {
        Ok(EdgeRecord {
            id: parse_id(&self.id)?,
            workflow_id: parse_id(&self.workflow_id)?,
            from_node: parse_id(&self.from_node_id)?,
            to_node: parse_id(&self.to_node_id)?,
        })
    }
}

#[derive(FromRow)]
struct DatasetRow {
    id: String,
    name: String,
    source_node_id: Option<String>,
    domain: String,
    row_count: i64,
    channel_count: i64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    sample_rate: Option<f64>,
    created_at: DateTime<Utc>,
}

impl DatasetRow {
    fn try_into_record(self) -> Result<DatasetRecord, RepositoryError> {
        let domain = Domain::from_str_value(&self.domain)
            .ok_or_else(|| corrupt(format!("unknown dataset domain '{}'", self.domain)))?;

        Ok(DatasetRecord {
            id: parse_id(&self.id)?,
            name: self.name,
            source_node: self
                .source_node_id
                .as_deref()
                .map(parse_id::<NodeId>)
                .transpose()?,
            summary: DatasetSummary {
                domain,
                row_count: usize::try_from(self.row_count).unwrap_or(0),
                channel_count: usize::try_from(self.channel_count).unwrap_or(0),
                start_time: self.start_time,
                end_time: self.end_time,
                sample_rate: self.sample_rate,
            },
            created_at: self.created_at,
        })
    }
}

fn parse_id<T>(value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| corrupt(format!("invalid id '{value}': {err}")))
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn count_to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn corrupt(message: String) -> RepositoryError {
    RepositoryError::Storage { message }
}

fn storage(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage {
        message: err.to_string(),
    }
}
