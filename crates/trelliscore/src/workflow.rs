use crate::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = Uuid;
pub type ConnectionId = Uuid;

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub trigger: TriggerType,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub variables: Payload,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// A draft workflow with no nodes.
    pub fn new(name: impl Into<String>, trigger: TriggerType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            trigger,
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: Payload::new(),
            settings: WorkflowSettings::default(),
            statistics: Statistics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Append an unguarded connection and return its id.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> ConnectionId {
        self.add_connection(Connection::new(source, target))
    }

    /// Append a connection guarded by `condition`.
    pub fn connect_when(
        &mut self,
        source: NodeId,
        target: NodeId,
        condition: impl Into<String>,
    ) -> ConnectionId {
        self.add_connection(Connection::new(source, target).with_condition(condition))
    }

    pub fn add_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id;
        self.connections.push(connection);
        id
    }

    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn find_connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Every node of type `trigger`, in node order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind.node_type() == NodeType::Trigger)
    }

    /// Outgoing connections of `node`, in connection list order.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.source == node)
    }

    /// Remove a node together with every connection that references it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        self.connections.retain(|c| c.source != id && c.target != id);
        Some(self.nodes.remove(index))
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(index))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

/// How a workflow is started. Dispatch of schedules and webhooks lives
/// outside the engine; this only records the intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Webhook { path: String },
    Schedule { cron: String },
    Event { event_type: String },
}

/// Node in a workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    pub kind: NodeKind,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            position: None,
            kind,
            status: NodeStatus::Active,
        }
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Trigger)
    }

    pub fn condition(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self::new(
            name,
            NodeKind::Condition {
                condition: condition.into(),
            },
        )
    }

    pub fn action(name: impl Into<String>, action_type: impl Into<String>, action_config: Payload) -> Self {
        Self::new(
            name,
            NodeKind::Action {
                action_type: action_type.into(),
                action_config,
            },
        )
    }

    pub fn delay(name: impl Into<String>, delay_ms: u64) -> Self {
        Self::new(name, NodeKind::Delay { delay_ms })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

/// Type-specific node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Condition {
        condition: String,
    },
    Action {
        action_type: String,
        #[serde(default)]
        action_config: Payload,
    },
    Delay {
        delay_ms: u64,
    },
    Split,
    Merge,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Trigger => NodeType::Trigger,
            NodeKind::Condition { .. } => NodeType::Condition,
            NodeKind::Action { .. } => NodeType::Action,
            NodeKind::Delay { .. } => NodeType::Delay,
            NodeKind::Split => NodeType::Split,
            NodeKind::Merge => NodeType::Merge,
        }
    }
}

/// Bare node type tag, used in logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Condition,
    Action,
    Delay,
    Split,
    Merge,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeType::Trigger => "trigger",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::Delay => "delay",
            NodeType::Split => "split",
            NodeType::Merge => "merge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Directed edge between two nodes, optionally guarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Connection {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            condition: None,
            label: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Retry policy applied by callers that re-trigger failed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Wait before attempt number `attempt` (1-based; the first attempt never waits).
    pub fn delay_before(&self, attempt: u32) -> u64 {
        if attempt <= 1 {
            return 0;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 2);
        (self.delay_ms as f64 * factor) as u64
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Global workflow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Deadline for a whole run; `None` disables it.
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub on_error: ErrorHandling,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: None,
            retry: RetryPolicy::default(),
            on_error: ErrorHandling::StopWorkflow,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// First failing node aborts the whole run.
    #[default]
    StopWorkflow,
    /// A failing node prunes only its own branch.
    ContinueOnError,
}

/// Running aggregates over every finished execution of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    #[serde(default)]
    pub cancelled_executions: u64,
    /// Milliseconds.
    pub average_duration: f64,
    pub last_execution: Option<DateTime<Utc>>,
}

impl Statistics {
    pub fn record(&mut self, outcome: ExecutionOutcome, duration_ms: u64, finished_at: DateTime<Utc>) {
        self.total_executions += 1;
        match outcome {
            ExecutionOutcome::Succeeded => self.successful_executions += 1,
            ExecutionOutcome::Failed => self.failed_executions += 1,
            ExecutionOutcome::Cancelled => self.cancelled_executions += 1,
        }

        let n = self.total_executions as f64;
        self.average_duration = (self.average_duration * (n - 1.0) + duration_ms as f64) / n;
        self.last_execution = Some(finished_at);
    }
}

/// Terminal result of a run, as far as statistics are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed,
    Cancelled,
}
