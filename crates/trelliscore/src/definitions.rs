//! Read-only catalogs describing available triggers and actions for editors.
//!
//! The engine never consults these; it dispatches actions by type string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub trigger_type: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub config_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub action_type: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub config_schema: Value,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

/// Trigger and action definitions keyed by type string.
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    triggers: BTreeMap<String, TriggerDefinition>,
    actions: BTreeMap<String, ActionDefinition>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_trigger(&mut self, definition: TriggerDefinition) {
        tracing::debug!(trigger_type = %definition.trigger_type, "registering trigger definition");
        self.triggers.insert(definition.trigger_type.clone(), definition);
    }

    pub fn register_action(&mut self, definition: ActionDefinition) {
        tracing::debug!(action_type = %definition.action_type, "registering action definition");
        self.actions.insert(definition.action_type.clone(), definition);
    }

    pub fn trigger(&self, trigger_type: &str) -> Option<&TriggerDefinition> {
        self.triggers.get(trigger_type)
    }

    pub fn action(&self, action_type: &str) -> Option<&ActionDefinition> {
        self.actions.get(action_type)
    }

    /// Sorted by type.
    pub fn triggers(&self) -> impl Iterator<Item = &TriggerDefinition> {
        self.triggers.values()
    }

    /// Sorted by type.
    pub fn actions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.values()
    }
}
