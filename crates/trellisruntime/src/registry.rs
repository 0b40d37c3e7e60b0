use trelliscore::{ActionContext, ActionHandler, NodeError, Payload};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of action handlers keyed by action type
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        let action_type = handler.action_type().to_string();
        tracing::info!("Registering action type: {}", action_type);
        self.handlers.insert(action_type, handler);
    }

    pub fn get(&self, action_type: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(action_type)
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    /// Get all registered action types, sorted
    pub fn list_action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Run the handler registered for `action_type`
    pub async fn dispatch(&self, action_type: &str, ctx: ActionContext) -> Result<Payload, NodeError> {
        let handler = self
            .get(action_type)
            .ok_or_else(|| NodeError::UnknownAction(action_type.to_string()))?;
        handler.execute(ctx).await
    }

    /// Ask the handler for `action_type` to check a node's config
    pub fn validate_config(&self, action_type: &str, config: &Payload) -> Result<(), NodeError> {
        let handler = self
            .get(action_type)
            .ok_or_else(|| NodeError::UnknownAction(action_type.to_string()))?;
        handler.validate_config(config)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
