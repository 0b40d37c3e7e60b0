use crate::executor::WorkflowExecutor;
use crate::registry::ActionRegistry;
use crate::store::WorkflowStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trelliscore::{
    validate, validate_connection, AutomationError, ConditionEvaluator, Connection, ConnectionId,
    DefinitionCatalog, EventBus, Execution, ExecutionEvent, ExecutionId, GuardFallback, Node, NodeId,
    NodeKind, NotFound, Payload, Result, ValidationError, ValidationErrors, Workflow, WorkflowId,
    WorkflowStatus,
};

/// Configuration for the service
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub event_buffer_size: usize,
    /// Outcome of guard conditions with no recognised operator
    pub guard_fallback: GuardFallback,
    /// Executions returned by `list_executions` when no limit is given
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            guard_fallback: GuardFallback::Allow,
            history_limit: 50,
        }
    }
}

struct Shared {
    store: Arc<dyn WorkflowStore>,
    executor: WorkflowExecutor,
    running: RwLock<HashMap<ExecutionId, CancellationToken>>,
    /// Serialises read-modify-write cycles on workflow records
    workflow_lock: Mutex<()>,
}

impl Shared {
    async fn record_statistics(&self, execution: &Execution) {
        let Some(outcome) = execution.outcome() else {
            return;
        };
        let _guard = self.workflow_lock.lock().await;

        let mut workflow = match self.store.get_workflow(execution.workflow_id).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                tracing::warn!("Workflow {} vanished before statistics update", execution.workflow_id);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to load workflow {} for statistics: {}", execution.workflow_id, e);
                return;
            }
        };

        workflow.statistics.record(
            outcome,
            execution.duration.unwrap_or_default(),
            execution.ended_at.unwrap_or(execution.started_at),
        );
        if let Err(e) = self.store.upsert_workflow(&workflow).await {
            tracing::warn!("Failed to store statistics for workflow {}: {}", workflow.id, e);
        }
    }
}

/// A started execution running in the background
pub struct ExecutionHandle {
    /// Snapshot taken when the run was created, status `running`
    pub execution: Execution,
    cancel: CancellationToken,
    join: JoinHandle<Execution>,
}

impl ExecutionHandle {
    pub fn id(&self) -> ExecutionId {
        self.execution.id
    }

    /// Request cancellation; the run ends `cancelled` at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to reach a terminal status.
    pub async fn wait(self) -> Result<Execution> {
        self.join
            .await
            .map_err(|e| AutomationError::Task(e.to_string()))
    }
}

/// Workflow CRUD plus the trigger entry point.
///
/// Every mutation is validated before it reaches the store; executions run
/// on spawned tasks and update workflow statistics when they finish.
#[derive(Clone)]
pub struct AutomationService {
    shared: Arc<Shared>,
    actions: Arc<ActionRegistry>,
    catalog: Arc<DefinitionCatalog>,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
}

impl AutomationService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        actions: Arc<ActionRegistry>,
        catalog: Arc<DefinitionCatalog>,
        config: EngineConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let executor = WorkflowExecutor::new(
            actions.clone(),
            store.clone(),
            event_bus.clone(),
            ConditionEvaluator::new(config.guard_fallback),
        );

        Self {
            shared: Arc::new(Shared {
                store,
                executor,
                running: RwLock::new(HashMap::new()),
                workflow_lock: Mutex::new(()),
            }),
            actions,
            catalog,
            event_bus,
            config,
        }
    }

    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    pub fn definitions(&self) -> &Arc<DefinitionCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        self.shared
            .store
            .get_workflow(id)
            .await?
            .ok_or_else(|| NotFound::Workflow(id).into())
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.shared.store.list_workflows().await?)
    }

    pub async fn create_workflow(&self, mut workflow: Workflow) -> Result<Workflow> {
        let _guard = self.shared.workflow_lock.lock().await;

        if self.shared.store.get_workflow(workflow.id).await?.is_some() {
            return Err(AutomationError::Conflict(format!("workflow {} already exists", workflow.id)));
        }
        self.check(&workflow)?;
        workflow.touch();
        self.shared.store.upsert_workflow(&workflow).await?;

        tracing::info!("Created workflow: {} ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    /// Replace a workflow's definition. Statistics and creation time are kept.
    pub async fn update_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        self.modify(workflow.id, move |current| {
            let statistics = current.statistics.clone();
            let created_at = current.created_at;
            *current = workflow;
            current.statistics = statistics;
            current.created_at = created_at;
            Ok(())
        })
        .await
        .map(|(workflow, ())| workflow)
    }

    /// Change lifecycle status. Activation also checks action types and configs.
    pub async fn set_status(&self, id: WorkflowId, status: WorkflowStatus) -> Result<Workflow> {
        self.modify(id, move |workflow| {
            workflow.status = status;
            Ok(())
        })
        .await
        .map(|(workflow, ())| workflow)
    }

    /// Delete a workflow and all of its executions.
    ///
    /// Refused with a conflict while any execution is still running.
    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<()> {
        let _guard = self.shared.workflow_lock.lock().await;

        if self.shared.store.get_workflow(id).await?.is_none() {
            return Err(NotFound::Workflow(id).into());
        }
        let running = self.shared.store.list_running_executions(id).await?;
        if !running.is_empty() {
            return Err(AutomationError::Conflict(format!(
                "workflow {} has {} running execution(s)",
                id,
                running.len()
            )));
        }

        self.shared.store.delete_workflow_data(id).await?;
        tracing::info!("Deleted workflow {}", id);
        Ok(())
    }

    /// Add a node, optionally together with the connection that feeds it.
    pub async fn add_node(&self, workflow_id: WorkflowId, node: Node, incoming: Option<Connection>) -> Result<NodeId> {
        self.modify(workflow_id, move |workflow| {
            let node_id = workflow.add_node(node);
            if let Some(connection) = incoming {
                validate_connection(workflow, &connection)?;
                workflow.add_connection(connection);
            }
            Ok(node_id)
        })
        .await
        .map(|(_, node_id)| node_id)
    }

    pub async fn update_node(&self, workflow_id: WorkflowId, node: Node) -> Result<Workflow> {
        self.modify(workflow_id, move |workflow| {
            let slot = workflow
                .find_node_mut(node.id)
                .ok_or(NotFound::Node(node.id))?;
            *slot = node;
            Ok(())
        })
        .await
        .map(|(workflow, ())| workflow)
    }

    /// Remove a node and every connection touching it.
    pub async fn remove_node(&self, workflow_id: WorkflowId, node_id: NodeId) -> Result<Node> {
        self.modify(workflow_id, move |workflow| {
            workflow
                .remove_node(node_id)
                .ok_or_else(|| NotFound::Node(node_id).into())
        })
        .await
        .map(|(_, node)| node)
    }

    /// Add a connection. A repeated (source, target) pair is a conflict.
    pub async fn add_connection(&self, workflow_id: WorkflowId, connection: Connection) -> Result<ConnectionId> {
        self.modify(workflow_id, move |workflow| {
            if let Err(errors) = validate_connection(workflow, &connection) {
                let duplicate = errors
                    .0
                    .iter()
                    .find(|e| matches!(e, ValidationError::DuplicateConnection { .. }));
                return Err(match duplicate {
                    Some(e) => AutomationError::Conflict(e.to_string()),
                    None => errors.into(),
                });
            }
            Ok(workflow.add_connection(connection))
        })
        .await
        .map(|(_, id)| id)
    }

    pub async fn remove_connection(&self, workflow_id: WorkflowId, connection_id: ConnectionId) -> Result<Connection> {
        self.modify(workflow_id, move |workflow| {
            workflow
                .remove_connection(connection_id)
                .ok_or_else(|| NotFound::Connection(connection_id).into())
        })
        .await
        .map(|(_, connection)| connection)
    }

    /// Start a run of an active workflow.
    ///
    /// Returns once the `running` execution record is stored; node traversal
    /// continues on a spawned task. The record is written under the workflow
    /// lock, so a concurrent delete either sees it or happens first.
    pub async fn execute_workflow(&self, workflow_id: WorkflowId, trigger_data: Payload) -> Result<ExecutionHandle> {
        let (workflow, execution, cancel) = {
            let _guard = self.shared.workflow_lock.lock().await;

            let workflow = self.get_workflow(workflow_id).await?;
            if workflow.status != WorkflowStatus::Active {
                return Err(AutomationError::Inactive(workflow_id));
            }

            let execution = Execution::start(workflow.id, trigger_data);
            self.shared.store.upsert_execution(&execution).await?;

            let cancel = CancellationToken::new();
            self.shared
                .running
                .write()
                .await
                .insert(execution.id, cancel.clone());
            (workflow, execution, cancel)
        };

        let shared = self.shared.clone();
        let snapshot = execution.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let workflow = Arc::new(workflow);
            let id = execution.id;
            let initial = execution.clone();

            let attempt = {
                let shared = shared.clone();
                let workflow = workflow.clone();
                tokio::spawn(async move { shared.executor.run(&workflow, execution, token).await })
            };

            let finished = match attempt.await {
                Ok(finished) => finished,
                Err(e) => {
                    let last = match shared.store.get_execution(id).await {
                        Ok(Some(stored)) => stored,
                        _ => initial,
                    };
                    shared
                        .executor
                        .abort(&workflow, last, format!("Execution task failed: {}", e))
                        .await
                }
            };

            shared.running.write().await.remove(&finished.id);
            shared.record_statistics(&finished).await;
            finished
        });

        Ok(ExecutionHandle {
            execution: snapshot,
            cancel,
            join,
        })
    }

    /// Cancel a running execution by id.
    ///
    /// A run that already reached a terminal status is a conflict, even if
    /// its task has not yet been reaped.
    pub async fn cancel_execution(&self, id: ExecutionId) -> Result<()> {
        let token = self.shared.running.read().await.get(&id).cloned();

        match self.shared.store.get_execution(id).await? {
            Some(execution) if execution.status.is_terminal() => Err(AutomationError::Conflict(format!(
                "execution {} already finished as {:?}",
                id, execution.status
            ))),
            Some(_) => match token {
                Some(token) => {
                    tracing::info!("Cancelling execution {}", id);
                    token.cancel();
                    Ok(())
                }
                None => Err(AutomationError::Conflict(format!("execution {} is not running here", id))),
            },
            None => Err(NotFound::Execution(id).into()),
        }
    }

    pub async fn get_execution(&self, id: ExecutionId) -> Result<Execution> {
        self.shared
            .store
            .get_execution(id)
            .await?
            .ok_or_else(|| NotFound::Execution(id).into())
    }

    /// Most recent first; `None` uses the configured history limit.
    pub async fn list_executions(&self, workflow_id: WorkflowId, limit: Option<usize>) -> Result<Vec<Execution>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.shared.store.list_executions(workflow_id, limit).await?)
    }

    /// Load, mutate, validate and store a workflow under the workflow lock.
    async fn modify<T>(
        &self,
        id: WorkflowId,
        change: impl FnOnce(&mut Workflow) -> Result<T>,
    ) -> Result<(Workflow, T)> {
        let _guard = self.shared.workflow_lock.lock().await;

        let mut workflow = self
            .shared
            .store
            .get_workflow(id)
            .await?
            .ok_or(NotFound::Workflow(id))?;

        let value = change(&mut workflow)?;
        workflow.id = id;
        self.check(&workflow)?;
        workflow.touch();
        self.shared.store.upsert_workflow(&workflow).await?;

        Ok((workflow, value))
    }

    /// Graph validation, plus action checks for workflows that can run.
    fn check(&self, workflow: &Workflow) -> Result<()> {
        let mut errors = match validate(workflow) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.0,
        };

        if workflow.status == WorkflowStatus::Active {
            errors.extend(self.check_actions(workflow));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors).into())
        }
    }

    fn check_actions(&self, workflow: &Workflow) -> Vec<ValidationError> {
        workflow
            .nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Action {
                    action_type,
                    action_config,
                } => {
                    if !self.actions.contains(action_type) {
                        return Some(ValidationError::UnknownAction {
                            node: node.id,
                            action_type: action_type.clone(),
                        });
                    }
                    self.actions
                        .validate_config(action_type, action_config)
                        .err()
                        .map(|e| ValidationError::InvalidActionConfig {
                            node: node.id,
                            reason: e.to_string(),
                        })
                }
                _ => None,
            })
            .collect()
    }
}
