use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};
use trelliscore::{into_payload, ActionContext, ActionHandler, NodeError, Payload};

/// Pause for `duration_ms`, which may be a number or a templated string
pub struct WaitAction;

#[async_trait]
impl ActionHandler for WaitAction {
    fn action_type(&self) -> &str {
        "wait"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let duration_ms = match ctx.require_config("duration_ms")? {
            Value::Number(n) => n.as_u64(),
            Value::String(_) => ctx.render("duration_ms")?.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| NodeError::InvalidConfig {
            field: "duration_ms".to_string(),
            reason: "expected a non-negative whole number of milliseconds".to_string(),
        })?;

        ctx.events.info(format!("Waiting for {}ms", duration_ms));
        sleep(Duration::from_millis(duration_ms)).await;

        Ok(into_payload(json!({ "waited_ms": duration_ms })))
    }
}
