use crate::registry::ActionRegistry;
use crate::store::WorkflowStore;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use trelliscore::{
    merge, ActionContext, ConditionEvaluator, Connection, ErrorHandling, EventBus, Execution,
    ExecutionEvent, ExecutionStatus, LogEntry, LogStatus, Node, NodeError, NodeKind, NodeStatus,
    Payload, Workflow,
};

/// Key under which workflow variables are exposed to the trigger node.
pub const VARIABLES_KEY: &str = "vars";

/// Key a condition node writes its boolean result to.
pub const CONDITION_RESULT_KEY: &str = "condition_result";

/// Runs one execution of a workflow graph.
///
/// Traversal is depth-first and sequential: the outgoing connections of a
/// node are followed one after another in connection list order, and a node
/// reached along several paths runs once per path. The walk uses an explicit
/// stack, so graph depth is not bounded by the call stack.
pub struct WorkflowExecutor {
    actions: Arc<ActionRegistry>,
    store: Arc<dyn WorkflowStore>,
    event_bus: Arc<EventBus>,
    conditions: ConditionEvaluator,
}

impl WorkflowExecutor {
    pub fn new(
        actions: Arc<ActionRegistry>,
        store: Arc<dyn WorkflowStore>,
        event_bus: Arc<EventBus>,
        conditions: ConditionEvaluator,
    ) -> Self {
        Self {
            actions,
            store,
            event_bus,
            conditions,
        }
    }

    /// Drive `execution` to a terminal status and return it.
    ///
    /// The run ends `cancelled` when `cancel` fires, and `failed` when the
    /// workflow's `timeout_minutes` elapses first.
    pub async fn run(&self, workflow: &Workflow, mut execution: Execution, cancel: CancellationToken) -> Execution {
        tracing::info!("Starting execution {} of workflow {}", execution.id, workflow.id);

        self.event_bus.emit(ExecutionEvent::ExecutionStarted {
            execution_id: execution.id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });

        let timeout_minutes = workflow.settings.timeout_minutes;
        let result = {
            let traversal = self.traverse(workflow, &mut execution);
            tokio::pin!(traversal);

            let deadline = async {
                match timeout_minutes.and_then(|minutes| minutes.checked_mul(60)) {
                    Some(secs) => sleep(Duration::from_secs(secs)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let result = tokio::select! {
                result = &mut traversal => result,
                _ = cancel.cancelled() => Err(NodeError::Cancelled),
                _ = deadline => Err(NodeError::Timeout {
                    minutes: timeout_minutes.unwrap_or_default(),
                }),
            };
            result
        };

        match result {
            Ok(()) => execution.finish(ExecutionStatus::Completed, None),
            Err(NodeError::Cancelled) => {
                abandon_open_entries(&mut execution, &NodeError::Cancelled.to_string());
                execution.finish(ExecutionStatus::Cancelled, Some(NodeError::Cancelled.to_string()));
            }
            Err(e) => {
                abandon_open_entries(&mut execution, &e.to_string());
                execution.finish(ExecutionStatus::Failed, Some(e.to_string()));
            }
        }
        self.conclude(workflow, execution).await
    }

    /// Fail a run whose task died before reaching a terminal status.
    ///
    /// `execution` is the last stored copy of the record.
    pub async fn abort(&self, workflow: &Workflow, mut execution: Execution, reason: String) -> Execution {
        tracing::error!("Execution {} aborted: {}", execution.id, reason);
        abandon_open_entries(&mut execution, &reason);
        execution.finish(ExecutionStatus::Failed, Some(reason));
        self.conclude(workflow, execution).await
    }

    async fn conclude(&self, workflow: &Workflow, execution: Execution) -> Execution {
        self.persist(&execution).await;

        let duration_ms = execution.duration.unwrap_or_default();
        match execution.status {
            ExecutionStatus::Completed => {
                tracing::info!("Execution {} completed in {}ms", execution.id, duration_ms)
            }
            status => tracing::warn!(
                "Execution {} ended {:?} after {}ms: {}",
                execution.id,
                status,
                duration_ms,
                execution.error_message.as_deref().unwrap_or("")
            ),
        }

        self.event_bus.emit(ExecutionEvent::ExecutionFinished {
            execution_id: execution.id,
            workflow_id: workflow.id,
            status: execution.status,
            duration_ms,
            timestamp: Utc::now(),
        });

        execution
    }

    async fn traverse(&self, workflow: &Workflow, execution: &mut Execution) -> Result<(), NodeError> {
        let mut triggers = workflow.trigger_nodes();
        let trigger = match (triggers.next(), triggers.next()) {
            (Some(trigger), None) => trigger,
            (None, _) => return Err(NodeError::Graph("workflow has no trigger node".to_string())),
            (Some(_), Some(_)) => {
                return Err(NodeError::Graph("workflow has more than one trigger node".to_string()))
            }
        };

        let mut input = execution.trigger_data.clone();
        if !workflow.variables.is_empty() && !input.contains_key(VARIABLES_KEY) {
            input.insert(VARIABLES_KEY.to_string(), Value::Object(workflow.variables.clone()));
        }

        let mut first_failure = None;
        let mut stack = vec![(trigger, input)];

        while let Some((node, input)) = stack.pop() {
            match self.visit(node, input, execution).await {
                Ok(Some(output)) => {
                    let next = workflow
                        .outgoing(node.id)
                        .filter(|conn| self.guard_allows(conn, &output))
                        .map(|conn| {
                            workflow
                                .find_node(conn.target)
                                .map(|target| (target, output.clone()))
                                .ok_or_else(|| {
                                    NodeError::Graph(format!(
                                        "connection {} targets missing node {}",
                                        conn.id, conn.target
                                    ))
                                })
                        })
                        .collect::<Result<Vec<_>, NodeError>>()?;
                    stack.extend(next.into_iter().rev());
                }
                Ok(None) => {}
                Err(e) => match workflow.settings.on_error {
                    ErrorHandling::StopWorkflow => return Err(e),
                    ErrorHandling::ContinueOnError => {
                        first_failure.get_or_insert(e);
                    }
                },
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run one node and log it. `Ok(None)` means the node was skipped.
    async fn visit(&self, node: &Node, input: Payload, execution: &mut Execution) -> Result<Option<Payload>, NodeError> {
        tracing::debug!("Visiting node {} ({}) in execution {}", node.name, node.node_type(), execution.id);

        execution
            .log
            .push(LogEntry::started(node.id, node.name.clone(), node.node_type(), input.clone()));
        let index = execution.log.len() - 1;
        self.persist(execution).await;

        self.event_bus.emit(ExecutionEvent::NodeStarted {
            execution_id: execution.id,
            node_id: node.id,
            node_name: node.name.clone(),
            node_type: node.node_type(),
            timestamp: Utc::now(),
        });

        if node.status != NodeStatus::Active {
            let reason = format!("node status is {:?}", node.status).to_lowercase();
            execution.log[index].skip(reason.clone());
            self.persist(execution).await;
            self.event_bus.emit(ExecutionEvent::NodeSkipped {
                execution_id: execution.id,
                node_id: node.id,
                reason,
                timestamp: Utc::now(),
            });
            return Ok(None);
        }

        let start = Instant::now();
        let result = self.execute_node(node, input, execution).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                tracing::debug!("Node {} completed in {}ms", node.id, duration_ms);
                execution.log[index].complete(output.clone(), duration_ms);
                self.persist(execution).await;
                self.event_bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id: execution.id,
                    node_id: node.id,
                    output: output.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(Some(output))
            }
            Err(e) => {
                tracing::error!("Node {} ({}) failed: {}", node.name, node.id, e);
                execution.log[index].fail(e.to_string(), duration_ms);
                self.persist(execution).await;
                self.event_bus.emit(ExecutionEvent::NodeFailed {
                    execution_id: execution.id,
                    node_id: node.id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn execute_node(&self, node: &Node, input: Payload, execution: &Execution) -> Result<Payload, NodeError> {
        match &node.kind {
            NodeKind::Trigger | NodeKind::Split | NodeKind::Merge => Ok(input),
            NodeKind::Condition { condition } => {
                let passed = self.conditions.evaluate(condition, &input);
                let mut output = input;
                output.insert(CONDITION_RESULT_KEY.to_string(), Value::Bool(passed));
                Ok(output)
            }
            NodeKind::Action {
                action_type,
                action_config,
            } => {
                let ctx = ActionContext {
                    execution_id: execution.id,
                    node_id: node.id,
                    config: action_config.clone(),
                    input: input.clone(),
                    events: self.event_bus.create_emitter(execution.id, node.id),
                };
                let output = self.actions.dispatch(action_type, ctx).await?;
                Ok(merge(&input, output))
            }
            NodeKind::Delay { delay_ms } => {
                sleep(Duration::from_millis(*delay_ms)).await;
                Ok(input)
            }
        }
    }

    fn guard_allows(&self, connection: &Connection, output: &Payload) -> bool {
        match &connection.condition {
            Some(condition) if !condition.trim().is_empty() => {
                let allowed = self.conditions.evaluate(condition, output);
                if !allowed {
                    tracing::debug!("Guard '{}' blocked connection {}", condition, connection.id);
                }
                allowed
            }
            _ => true,
        }
    }

    /// Best effort: a failed write is logged and the run carries on.
    async fn persist(&self, execution: &Execution) {
        if let Err(e) = self.store.upsert_execution(execution).await {
            tracing::warn!("Failed to persist execution {}: {}", execution.id, e);
        }
    }
}

/// Close log entries left `started` by an interrupted node.
fn abandon_open_entries(execution: &mut Execution, error: &str) {
    let now = Utc::now();
    for entry in execution.log.iter_mut().filter(|e| e.status == LogStatus::Started) {
        let elapsed = (now - entry.timestamp).num_milliseconds().max(0) as u64;
        entry.fail(error, elapsed);
    }
}
