mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trelliscore::{
    ErrorHandling, EventBus, Execution, ExecutionStatus, LogStatus, Node, NodeKind, NodeStatus, NodeType,
    TriggerType, Workflow, WorkflowStatus,
};
use trellisruntime::{WorkflowExecutor, WorkflowStore, CONDITION_RESULT_KEY};

#[tokio::test]
async fn test_two_runs_produce_independent_executions() {
    init_tracing();
    let h = harness();
    let workflow = h.service.create_workflow(two_node_workflow()).await.unwrap();

    let first = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "email": "a@example.com" })))
        .await
        .unwrap();
    assert_eq!(first.execution.status, ExecutionStatus::Running);
    let first = first.wait().await.unwrap();

    let second = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "email": "b@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    for execution in [&first, &second] {
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.log.len(), 2);
        assert_eq!(execution.log[0].node_type, NodeType::Trigger);
        assert_eq!(execution.log[1].node_type, NodeType::Action);
        assert!(execution.log.iter().all(|e| e.status == LogStatus::Completed));
        assert!(execution.ended_at.is_some());
        assert!(execution.duration.is_some());
    }

    assert_eq!(
        *h.email.sent.lock().unwrap(),
        vec!["a@example.com".to_string(), "b@example.com".to_string()]
    );
}

fn guarded_workflow() -> Workflow {
    let mut workflow = Workflow::new("big orders", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("order placed"));
    let check = workflow.add_node(Node::condition("is big", "{{amount}} > 100"));
    let email = workflow.add_node(email_node("notify sales"));
    workflow.connect(trigger, check);
    workflow.connect_when(check, email, "{{condition_result}} == true");
    workflow.status = WorkflowStatus::Active;
    workflow
}

#[tokio::test]
async fn test_false_guard_prunes_branch() {
    let h = harness();
    let workflow = h.service.create_workflow(guarded_workflow()).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "amount": 50, "email": "s@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let types: Vec<_> = execution.log.iter().map(|e| e.node_type).collect();
    assert_eq!(types, vec![NodeType::Trigger, NodeType::Condition]);

    let condition_output = execution.log[1].output.as_ref().unwrap();
    assert_eq!(condition_output[CONDITION_RESULT_KEY], json!(false));
    assert!(h.email.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_true_guard_follows_branch() {
    let h = harness();
    let workflow = h.service.create_workflow(guarded_workflow()).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "amount": 250, "email": "s@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.log.len(), 3);
    let output = execution.log[2].output.as_ref().unwrap();
    // Handler output is merged over the input.
    assert_eq!(output["amount"], json!(250));
    assert_eq!(output["recipient"], json!("s@example.com"));
    assert_eq!(output[CONDITION_RESULT_KEY], json!(true));
}

#[tokio::test]
async fn test_failing_action_fails_execution() {
    let h = harness();
    let mut workflow = Workflow::new("fails", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let bad = workflow.add_node(Node::action("bad", "explode", Default::default()));
    let after = workflow.add_node(email_node("after bad"));
    let sibling = workflow.add_node(email_node("sibling"));
    workflow.connect(trigger, bad);
    workflow.connect(bad, after);
    workflow.connect(trigger, sibling);
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "email": "x@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_message.as_deref(), Some("Action failed: boom"));
    assert_eq!(execution.log.len(), 2);
    assert_eq!(execution.log[1].status, LogStatus::Failed);
    assert_eq!(execution.log[1].error.as_deref(), Some("Action failed: boom"));
    assert!(h.email.sent.lock().unwrap().is_empty());

    let stored = h.service.get_execution(execution.id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_continue_on_error_visits_other_branches() {
    let h = harness();
    let mut workflow = Workflow::new("keeps going", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let bad = workflow.add_node(Node::action("bad", "explode", Default::default()));
    let after = workflow.add_node(email_node("after bad"));
    let sibling = workflow.add_node(email_node("sibling"));
    workflow.connect(trigger, bad);
    workflow.connect(bad, after);
    workflow.connect(trigger, sibling);
    workflow.settings.on_error = ErrorHandling::ContinueOnError;
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "email": "x@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.visited_nodes(), vec![trigger, bad, sibling]);
    assert_eq!(*h.email.sent.lock().unwrap(), vec!["x@example.com".to_string()]);
}

#[tokio::test]
async fn test_fan_out_is_depth_first_in_connection_order() {
    let h = harness();
    let mut workflow = Workflow::new("fan out", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let split = workflow.add_node(Node::new("split", NodeKind::Split));
    let a = workflow.add_node(Node::delay("a", 0));
    let b = workflow.add_node(Node::delay("b", 0));
    let a_child = workflow.add_node(Node::delay("a child", 0));
    workflow.connect(trigger, split);
    workflow.connect(split, a);
    workflow.connect(split, b);
    workflow.connect(a, a_child);
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, Default::default())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.visited_nodes(), vec![trigger, split, a, a_child, b]);
}

#[tokio::test]
async fn test_merge_runs_once_per_incoming_path() {
    let h = harness();
    let mut workflow = Workflow::new("diamond", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let left = workflow.add_node(Node::delay("left", 0));
    let right = workflow.add_node(Node::delay("right", 0));
    let merge = workflow.add_node(Node::new("merge", NodeKind::Merge));
    workflow.connect(trigger, left);
    workflow.connect(trigger, right);
    workflow.connect(left, merge);
    workflow.connect(right, merge);
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, Default::default())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.visited_nodes(), vec![trigger, left, merge, right, merge]);
}

#[tokio::test]
async fn test_inactive_node_is_skipped_with_its_branch() {
    let h = harness();
    let mut workflow = Workflow::new("paused step", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let off = workflow.add_node(email_node("off").with_status(NodeStatus::Inactive));
    let downstream = workflow.add_node(email_node("downstream"));
    workflow.connect(trigger, off);
    workflow.connect(off, downstream);
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "email": "x@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.visited_nodes(), vec![trigger, off]);
    assert_eq!(execution.log[1].status, LogStatus::Skipped);
    assert!(h.email.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_workflow_variables_are_available_to_templates() {
    let h = harness();
    let mut workflow = Workflow::new("uses vars", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let email = workflow.add_node(Node::action(
        "to support",
        "send_email",
        payload(json!({ "to": "{{vars.support_address}}" })),
    ));
    workflow.connect(trigger, email);
    workflow
        .variables
        .insert("support_address".to_string(), json!("help@example.com"));
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    h.service
        .execute_workflow(workflow.id, Default::default())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(*h.email.sent.lock().unwrap(), vec!["help@example.com".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_delay_node_passes_input_through() {
    let h = harness();
    let mut workflow = Workflow::new("delayed", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let pause = workflow.add_node(Node::delay("wait a bit", 5_000));
    workflow.connect(trigger, pause);
    workflow.status = WorkflowStatus::Active;
    let workflow = h.service.create_workflow(workflow).await.unwrap();

    let execution = h
        .service
        .execute_workflow(workflow.id, payload(json!({ "k": "v" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.log[1].output.as_ref().unwrap()["k"], json!("v"));
}

#[tokio::test]
async fn test_unknown_action_type_fails_the_run() {
    let h = harness();
    let executor = WorkflowExecutor::new(
        Arc::new(registry(h.email.clone())),
        h.store.clone(),
        Arc::new(EventBus::new(16)),
        Default::default(),
    );

    let mut workflow = Workflow::new("unregistered", TriggerType::Manual);
    let trigger = workflow.add_node(Node::trigger("start"));
    let mystery = workflow.add_node(Node::action("mystery", "launch_rocket", Default::default()));
    workflow.connect(trigger, mystery);

    let execution = executor
        .run(&workflow, Execution::start(workflow.id, Default::default()), CancellationToken::new())
        .await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_message.as_deref(), Some("Unknown action type: launch_rocket"));

    let stored = h.store.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(stored.log.len(), 2);
}

#[tokio::test]
async fn test_events_are_broadcast() {
    let h = harness();
    let workflow = h.service.create_workflow(two_node_workflow()).await.unwrap();
    let mut events = h.service.subscribe_events();

    h.service
        .execute_workflow(workflow.id, payload(json!({ "email": "a@example.com" })))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(match event {
            trelliscore::ExecutionEvent::ExecutionStarted { .. } => "execution_started",
            trelliscore::ExecutionEvent::NodeStarted { .. } => "node_started",
            trelliscore::ExecutionEvent::NodeCompleted { .. } => "node_completed",
            trelliscore::ExecutionEvent::ExecutionFinished { .. } => "execution_finished",
            _ => "other",
        });
    }
    assert_eq!(
        names,
        vec![
            "execution_started",
            "node_started",
            "node_completed",
            "node_started",
            "node_completed",
            "execution_finished",
        ]
    );
}
