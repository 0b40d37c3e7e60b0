use crate::events::EventEmitter;
use crate::template::{interpolate, interpolate_value};
use crate::{ExecutionId, NodeError, NodeId, Payload};
use async_trait::async_trait;
use serde_json::Value;

/// Handler for one action type (e.g. "send_email", "send_webhook").
///
/// Handlers receive the raw `action_config`, placeholders intact, and
/// interpolate the fields they use against `ctx.input`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Type string this handler is registered under
    fn action_type(&self) -> &str;

    /// Run the action. The returned object is merged over the node input.
    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError>;

    /// Optional: reject configuration before a workflow is activated
    fn validate_config(&self, _config: &Payload) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Everything an action handler sees for one invocation.
#[derive(Clone)]
pub struct ActionContext {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    /// `action_config` exactly as stored on the node
    pub config: Payload,
    /// Output of the previous node
    pub input: Payload,
    pub events: EventEmitter,
}

impl ActionContext {
    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::MissingConfig(name.to_string()))
    }

    /// Interpolated string config field.
    pub fn render(&self, name: &str) -> Result<String, NodeError> {
        match self.require_config(name)? {
            Value::String(s) => Ok(interpolate(s, &self.input)),
            other => Err(NodeError::InvalidConfig {
                field: name.to_string(),
                reason: format!("expected string, got {}", other),
            }),
        }
    }

    /// Interpolated string config field, if present.
    pub fn render_opt(&self, name: &str) -> Result<Option<String>, NodeError> {
        if self.config.contains_key(name) {
            self.render(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Config field of any shape with every nested string interpolated.
    pub fn render_value(&self, name: &str) -> Option<Value> {
        self.config.get(name).map(|v| interpolate_value(v, &self.input))
    }
}
