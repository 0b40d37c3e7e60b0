use crate::{ConnectionId, ExecutionId, NodeId, WorkflowId};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    NotFound(#[from] NotFound),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Workflow {0} is not active")]
    Inactive(WorkflowId),

    #[error("Execution error: {0}")]
    Execution(#[from] NodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An id that did not resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Workflow not found: {0}")]
    Workflow(WorkflowId),

    #[error("Node not found: {0}")]
    Node(NodeId),

    #[error("Connection not found: {0}")]
    Connection(ConnectionId),

    #[error("Execution not found: {0}")]
    Execution(ExecutionId),
}

/// A single structural problem with a workflow graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Workflow must have exactly one trigger node")]
    NoTrigger,

    #[error("Workflow must have exactly one trigger node, found {0}")]
    MultipleTriggers(usize),

    #[error("Node '{name}' ({id}) is not connected to the workflow")]
    OrphanNode { id: NodeId, name: String },

    #[error("Workflow contains a cycle through node {0}")]
    Cycle(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Connection {connection} references missing node {node}")]
    MissingEndpoint { connection: ConnectionId, node: NodeId },

    #[error("Connection already exists from {from} to {to}")]
    DuplicateConnection { from: NodeId, to: NodeId },

    #[error("Node {0} cannot connect to itself")]
    SelfLoop(NodeId),

    #[error("Node {node} uses unknown action type '{action_type}'")]
    UnknownAction { node: NodeId, action_type: String },

    #[error("Node {node} has invalid action config: {reason}")]
    InvalidActionConfig { node: NodeId, reason: String },
}

/// Every problem found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Failure raised while executing one node of a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing config: {0}")]
    MissingConfig(String),

    #[error("Invalid config for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid workflow graph: {0}")]
    Graph(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Timed out after {minutes} minute(s)")]
    Timeout { minutes: u64 },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    Missing(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}
