//! Workflow records.

use crate::execution::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigflow_core::WorkflowId;

/// A named container of nodes and edges.
///
/// The workflow owns its nodes and edges; they reference it by id and are
/// removed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the most recent run finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRecord {
    /// Creates a new, empty workflow in the draft state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the workflow as running.
    pub fn start(&mut self) {
        self.status = WorkflowStatus::Running;
        self.completed_at = None;
        self.updated_at = Utc::now();
    }

    /// Marks the workflow as completed.
    pub fn complete(&mut self) {
        self.finish(WorkflowStatus::Completed);
    }

    /// Marks the workflow as failed.
    pub fn fail(&mut self) {
        self.finish(WorkflowStatus::Failed);
    }

    fn finish(&mut self, status: WorkflowStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == WorkflowStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workflow_is_draft() {
        let workflow = WorkflowRecord::new("vibration").with_description("bearing sensors");
        assert_eq!(workflow.status, WorkflowStatus::Draft);
        assert_eq!(workflow.description.as_deref(), Some("bearing sensors"));
        assert!(workflow.completed_at.is_none());
    }

    #[test]
    fn run_lifecycle_sets_completion_time() {
        let mut workflow = WorkflowRecord::new("vibration");
        workflow.start();
        assert!(workflow.is_running());
        assert!(workflow.completed_at.is_none());

        workflow.complete();
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert!(workflow.completed_at.is_some());

        workflow.start();
        assert!(workflow.completed_at.is_none());
        workflow.fail();
        assert_eq!(workflow.status, WorkflowStatus::Failed);
        assert!(workflow.completed_at.is_some());
    }
}
