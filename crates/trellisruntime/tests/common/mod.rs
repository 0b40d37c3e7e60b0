#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use trelliscore::{
    into_payload, ActionContext, ActionHandler, DefinitionCatalog, Execution, ExecutionId, Node, NodeError,
    Payload, StoreError, TriggerType, Workflow, WorkflowId, WorkflowStatus,
};
use trellisruntime::{ActionRegistry, AutomationService, EngineConfig, InMemoryStore, WorkflowStore};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Stand-in for `send_email` that records what it was asked to send
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ActionHandler for RecordingEmail {
    fn action_type(&self) -> &str {
        "send_email"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let to = ctx.render("to")?;
        self.sent.lock().unwrap().push(to.clone());
        Ok(into_payload(json!({ "email_sent": true, "recipient": to })))
    }

    fn validate_config(&self, config: &Payload) -> Result<(), NodeError> {
        if config.contains_key("to") {
            Ok(())
        } else {
            Err(NodeError::MissingConfig("to".to_string()))
        }
    }
}

/// Always fails
pub struct Explode;

#[async_trait]
impl ActionHandler for Explode {
    fn action_type(&self) -> &str {
        "explode"
    }

    async fn execute(&self, _ctx: ActionContext) -> Result<Payload, NodeError> {
        Err(NodeError::ActionFailed("boom".to_string()))
    }
}

/// Panics instead of returning
pub struct Panics;

#[async_trait]
impl ActionHandler for Panics {
    fn action_type(&self) -> &str {
        "panics"
    }

    async fn execute(&self, _ctx: ActionContext) -> Result<Payload, NodeError> {
        panic!("handler bug")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePoint {
    ExecutionWrite,
    WorkflowWrite,
}

/// Holds the next matching write until released.
pub struct Gate {
    point: GatePoint,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// In-memory store that can pause one write so tests can interleave calls.
#[derive(Default)]
pub struct GatedStore {
    inner: InMemoryStore,
    gate: Mutex<Option<Gate>>,
}

impl GatedStore {
    /// Arm the gate; returns (entered, release) signals.
    pub fn arm(&self, point: GatePoint) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            point,
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }

    async fn pass(&self, point: GatePoint) {
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            match slot.as_ref() {
                Some(gate) if gate.point == point => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl WorkflowStore for GatedStore {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        self.inner.get_workflow(id).await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        self.inner.list_workflows().await
    }

    async fn upsert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.pass(GatePoint::WorkflowWrite).await;
        self.inner.upsert_workflow(workflow).await
    }

    async fn delete_workflow_data(&self, id: WorkflowId) -> Result<(), StoreError> {
        self.inner.delete_workflow_data(id).await
    }

    async fn upsert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.pass(GatePoint::ExecutionWrite).await;
        self.inner.upsert_execution(execution).await
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        self.inner.get_execution(id).await
    }

    async fn list_running_executions(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, StoreError> {
        self.inner.list_running_executions(workflow_id).await
    }

    async fn list_executions(&self, workflow_id: WorkflowId, limit: usize) -> Result<Vec<Execution>, StoreError> {
        self.inner.list_executions(workflow_id, limit).await
    }
}

pub struct Harness {
    pub service: AutomationService,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<RecordingEmail>,
}

pub fn registry(email: Arc<RecordingEmail>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(email);
    registry.register(Arc::new(Explode));
    registry.register(Arc::new(Panics));
    registry
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

/// Service over an arbitrary store, with the recording handlers registered
pub fn service_on(store: Arc<dyn WorkflowStore>) -> (AutomationService, Arc<RecordingEmail>) {
    let email = Arc::new(RecordingEmail::default());
    let service = AutomationService::new(
        store,
        Arc::new(registry(email.clone())),
        Arc::new(DefinitionCatalog::new()),
        EngineConfig::default(),
    );
    (service, email)
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let email = Arc::new(RecordingEmail::default());
    let service = AutomationService::new(
        store.clone() as Arc<dyn WorkflowStore>,
        Arc::new(registry(email.clone())),
        Arc::new(DefinitionCatalog::new()),
        config,
    );
    Harness { service, store, email }
}

pub fn email_node(name: &str) -> Node {
    Node::action(name, "send_email", into_payload(json!({ "to": "{{email}}" })))
}

/// trigger -> send_email, already active
pub fn two_node_workflow() -> Workflow {
    let mut workflow = Workflow::new("welcome", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let email = workflow.add_node(email_node("welcome email"));
    workflow.connect(trigger, email);
    workflow.status = WorkflowStatus::Active;
    workflow
}

pub fn payload(value: serde_json::Value) -> Payload {
    into_payload(value)
}
