use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use trelliscore::{into_payload, ActionContext, ActionHandler, NodeError, Payload};
use uuid::Uuid;

/// In-memory contact records shared by the contact actions
#[derive(Default)]
pub struct ContactBook {
    contacts: RwLock<HashMap<Uuid, Payload>>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Payload> {
        self.contacts.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.contacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contacts.read().await.is_empty()
    }

    async fn insert(&self, mut fields: Payload) -> (Uuid, Payload) {
        let id = Uuid::new_v4();
        fields.insert("id".to_string(), json!(id));
        fields.insert("created_at".to_string(), json!(Utc::now()));
        self.contacts.write().await.insert(id, fields.clone());
        (id, fields)
    }

    async fn update(&self, id: Uuid, fields: Payload) -> Option<Payload> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts.get_mut(&id)?;
        contact.extend(fields);
        contact.insert("updated_at".to_string(), json!(Utc::now()));
        Some(contact.clone())
    }
}

/// Interpolated `fields` object from the action config
fn render_fields(ctx: &ActionContext) -> Result<Payload, NodeError> {
    match ctx.render_value("fields") {
        Some(Value::Object(fields)) => Ok(fields),
        Some(_) => Err(NodeError::InvalidConfig {
            field: "fields".to_string(),
            reason: "expected object".to_string(),
        }),
        None => Err(NodeError::MissingConfig("fields".to_string())),
    }
}

pub struct CreateContactAction {
    book: Arc<ContactBook>,
}

impl CreateContactAction {
    pub fn new(book: Arc<ContactBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl ActionHandler for CreateContactAction {
    fn action_type(&self) -> &str {
        "create_contact"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let fields = render_fields(&ctx)?;
        let (id, contact) = self.book.insert(fields).await;
        ctx.events.info(format!("Created contact {}", id));

        Ok(into_payload(json!({
            "contact_id": id,
            "contact": contact,
        })))
    }
}

pub struct UpdateContactAction {
    book: Arc<ContactBook>,
}

impl UpdateContactAction {
    pub fn new(book: Arc<ContactBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl ActionHandler for UpdateContactAction {
    fn action_type(&self) -> &str {
        "update_contact"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let raw_id = ctx.render("contact_id")?;
        let id: Uuid = raw_id.trim().parse().map_err(|_| NodeError::InvalidConfig {
            field: "contact_id".to_string(),
            reason: format!("'{}' is not a contact id", raw_id),
        })?;
        let fields = render_fields(&ctx)?;

        let contact = self
            .book
            .update(id, fields)
            .await
            .ok_or_else(|| NodeError::ActionFailed(format!("contact {} not found", id)))?;
        ctx.events.info(format!("Updated contact {}", id));

        Ok(into_payload(json!({
            "contact_id": id,
            "contact": contact,
        })))
    }
}
