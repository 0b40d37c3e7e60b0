use crate::{ExecutionOutcome, NodeId, NodeType, Payload, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExecutionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub trigger_data: Payload,
    pub log: Vec<LogEntry>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Milliseconds, set once the run is terminal.
    pub duration: Option<u64>,
    pub error_message: Option<String>,
}

impl Execution {
    pub fn start(workflow_id: WorkflowId, trigger_data: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            trigger_data,
            log: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            duration: None,
            error_message: None,
        }
    }

    /// Move to a terminal status and stamp timing. No-op once terminal.
    pub fn finish(&mut self, status: ExecutionStatus, error_message: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = status;
        self.error_message = error_message;
        self.ended_at = Some(now);
        self.duration = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    pub fn outcome(&self) -> Option<ExecutionOutcome> {
        match self.status {
            ExecutionStatus::Running => None,
            ExecutionStatus::Completed => Some(ExecutionOutcome::Succeeded),
            ExecutionStatus::Failed => Some(ExecutionOutcome::Failed),
            ExecutionStatus::Cancelled => Some(ExecutionOutcome::Cancelled),
        }
    }

    /// Node ids in the order they were visited.
    pub fn visited_nodes(&self) -> Vec<NodeId> {
        self.log.iter().map(|e| e.node_id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

/// Record of one node visit inside an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub node_id: NodeId,
    pub node_name: String,
    pub node_type: NodeType,
    pub status: LogStatus,
    pub input: Payload,
    pub output: Option<Payload>,
    /// Milliseconds.
    pub duration: Option<u64>,
    pub error: Option<String>,
}

impl LogEntry {
    pub fn started(node_id: NodeId, node_name: impl Into<String>, node_type: NodeType, input: Payload) -> Self {
        Self {
            timestamp: Utc::now(),
            node_id,
            node_name: node_name.into(),
            node_type,
            status: LogStatus::Started,
            input,
            output: None,
            duration: None,
            error: None,
        }
    }

    pub fn complete(&mut self, output: Payload, duration: u64) {
        self.status = LogStatus::Completed;
        self.output = Some(output);
        self.duration = Some(duration);
    }

    pub fn fail(&mut self, error: impl Into<String>, duration: u64) {
        self.status = LogStatus::Failed;
        self.error = Some(error.into());
        self.duration = Some(duration);
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = LogStatus::Skipped;
        self.error = Some(reason.into());
        self.duration = Some(0);
    }
}
