//! Persistence boundary for workflows and executions.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use trelliscore::{Execution, ExecutionId, ExecutionStatus, StoreError, Workflow, WorkflowId};

/// Document store for workflows and their executions.
///
/// Writes are whole-record, last writer wins.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

    async fn upsert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// Remove a workflow together with every execution recorded for it.
    async fn delete_workflow_data(&self, id: WorkflowId) -> Result<(), StoreError>;

    async fn upsert_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    async fn list_running_executions(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, StoreError>;

    /// Most recent first.
    async fn list_executions(&self, workflow_id: WorkflowId, limit: usize) -> Result<Vec<Execution>, StoreError>;
}

/// Process-local store backed by hash maps
#[derive(Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    executions: RwLock<HashMap<ExecutionId, Execution>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        let mut workflows: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(workflows)
    }

    async fn upsert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.workflows.write().await.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn delete_workflow_data(&self, id: WorkflowId) -> Result<(), StoreError> {
        self.workflows.write().await.remove(&id);
        self.executions.write().await.retain(|_, e| e.workflow_id != id);
        Ok(())
    }

    async fn upsert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.executions.write().await.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn list_running_executions(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, StoreError> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id && e.status == ExecutionStatus::Running)
            .cloned()
            .collect())
    }

    async fn list_executions(&self, workflow_id: WorkflowId, limit: usize) -> Result<Vec<Execution>, StoreError> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        executions.truncate(limit);
        Ok(executions)
    }
}
