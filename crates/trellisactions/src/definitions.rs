use serde_json::json;
use trelliscore::{ActionDefinition, DefinitionCatalog, TriggerDefinition};

fn action(action_type: &str, name: &str, description: &str, category: &str) -> ActionDefinition {
    ActionDefinition {
        action_type: action_type.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        config_schema: json!({}),
        input_schema: json!({ "type": "object" }),
        output_schema: json!({}),
    }
}

fn trigger(trigger_type: &str, name: &str, description: &str) -> TriggerDefinition {
    TriggerDefinition {
        trigger_type: trigger_type.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: "trigger".to_string(),
        config_schema: json!({}),
        output_schema: json!({ "type": "object" }),
    }
}

/// Definitions for the built-in action handlers
pub fn action_definitions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition {
            config_schema: json!({
                "type": "object",
                "required": ["to"],
                "properties": {
                    "to": { "type": "string" },
                    "from": { "type": "string" },
                    "subject": { "type": "string" },
                    "body": { "type": "string" }
                }
            }),
            output_schema: json!({
                "email_sent": "boolean",
                "message_id": "string",
                "recipient": "string"
            }),
            ..action("send_email", "Send Email", "Send a templated email", "communication")
        },
        ActionDefinition {
            config_schema: json!({
                "type": "object",
                "required": ["fields"],
                "properties": { "fields": { "type": "object" } }
            }),
            output_schema: json!({ "contact_id": "string", "contact": "object" }),
            ..action("create_contact", "Create Contact", "Create a contact record", "crm")
        },
        ActionDefinition {
            config_schema: json!({
                "type": "object",
                "required": ["contact_id", "fields"],
                "properties": {
                    "contact_id": { "type": "string" },
                    "fields": { "type": "object" }
                }
            }),
            output_schema: json!({ "contact_id": "string", "contact": "object" }),
            ..action("update_contact", "Update Contact", "Update fields on a contact record", "crm")
        },
        ActionDefinition {
            config_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" },
                    "method": { "type": "string", "default": "POST" },
                    "headers": { "type": "object" },
                    "body": {}
                }
            }),
            output_schema: json!({ "webhook_status": "number", "webhook_response": "any" }),
            ..action("send_webhook", "Send Webhook", "Call an HTTP endpoint", "integration")
        },
        ActionDefinition {
            config_schema: json!({
                "type": "object",
                "required": ["duration_ms"],
                "properties": { "duration_ms": { "type": ["number", "string"] } }
            }),
            output_schema: json!({ "waited_ms": "number" }),
            ..action("wait", "Wait", "Pause before continuing", "flow")
        },
    ]
}

/// Definitions for the trigger kinds a workflow can declare
pub fn trigger_definitions() -> Vec<TriggerDefinition> {
    vec![
        trigger("manual", "Manual", "Started by a user"),
        TriggerDefinition {
            config_schema: json!({ "type": "object", "required": ["path"] }),
            ..trigger("webhook", "Webhook", "Started by an inbound HTTP request")
        },
        TriggerDefinition {
            config_schema: json!({ "type": "object", "required": ["cron"] }),
            ..trigger("schedule", "Schedule", "Started by an external scheduler")
        },
        TriggerDefinition {
            config_schema: json!({ "type": "object", "required": ["event_type"] }),
            ..trigger("event", "Event", "Started when a named event is published")
        },
    ]
}

/// Register every built-in definition with `catalog`
pub fn register_definitions(catalog: &mut DefinitionCatalog) {
    for definition in trigger_definitions() {
        catalog.register_trigger(definition);
    }
    for definition in action_definitions() {
        catalog.register_action(definition);
    }
}
