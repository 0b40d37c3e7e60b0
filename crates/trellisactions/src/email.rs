use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use trelliscore::{into_payload, ActionContext, ActionHandler, NodeError, Payload};
use uuid::Uuid;

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Delivery backend for `send_email`
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `message` and return a provider message id
    async fn send(&self, message: EmailMessage) -> Result<String, NodeError>;
}

/// Mailer that keeps every message in memory and logs it
#[derive(Default)]
pub struct Outbox {
    sent: RwLock<Vec<EmailMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, message: EmailMessage) -> Result<String, NodeError> {
        tracing::info!("Email to {}: {}", message.to, message.subject);
        self.sent.write().await.push(message);
        Ok(Uuid::new_v4().to_string())
    }
}

/// Sends an email built from templated `to`, `subject` and `body` fields
pub struct SendEmailAction {
    mailer: Arc<dyn Mailer>,
}

impl SendEmailAction {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl ActionHandler for SendEmailAction {
    fn action_type(&self) -> &str {
        "send_email"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let to = ctx.render("to")?;
        if to.trim().is_empty() || to.contains("{{") {
            return Err(NodeError::InvalidConfig {
                field: "to".to_string(),
                reason: format!("unresolved recipient '{}'", to),
            });
        }

        let message = EmailMessage {
            to: to.clone(),
            from: ctx.render_opt("from")?,
            subject: ctx.render_opt("subject")?.unwrap_or_default(),
            body: ctx.render_opt("body")?.unwrap_or_default(),
        };

        ctx.events.info(format!("Sending email to {}", to));
        let message_id = self.mailer.send(message).await?;

        Ok(into_payload(json!({
            "email_sent": true,
            "message_id": message_id,
            "recipient": to,
        })))
    }

    fn validate_config(&self, config: &Payload) -> Result<(), NodeError> {
        match config.get("to") {
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(NodeError::InvalidConfig {
                field: "to".to_string(),
                reason: "expected string".to_string(),
            }),
            None => Err(NodeError::MissingConfig("to".to_string())),
        }
    }
}
