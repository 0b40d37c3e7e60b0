use crate::runtime::AutomationService;
use tokio::time::{sleep, Duration};
use trelliscore::{Execution, ExecutionStatus, Payload, Result, WorkflowId};

/// Trigger a workflow and re-trigger it while runs fail, following the
/// workflow's `settings.retry` policy.
///
/// Each attempt is an independent execution. Returns the last one; a
/// completed or cancelled run ends the loop early.
pub async fn run_with_retry(
    service: &AutomationService,
    workflow_id: WorkflowId,
    trigger_data: Payload,
) -> Result<Execution> {
    let policy = service.get_workflow(workflow_id).await?.settings.retry;
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let wait = policy.delay_before(attempt);
        if wait > 0 {
            sleep(Duration::from_millis(wait)).await;
        }

        let execution = service
            .execute_workflow(workflow_id, trigger_data.clone())
            .await?
            .wait()
            .await?;

        if execution.status != ExecutionStatus::Failed || attempt >= max_attempts {
            return Ok(execution);
        }

        tracing::warn!(
            "Attempt {}/{} of workflow {} failed: {}",
            attempt,
            max_attempts,
            workflow_id,
            execution.error_message.as_deref().unwrap_or("unknown error")
        );
        attempt += 1;
    }
}
