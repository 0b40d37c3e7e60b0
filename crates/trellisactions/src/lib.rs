//! Standard action library
//!
//! Built-in handlers for the action types workflows commonly use, backed by
//! in-memory stand-ins where a real deployment would plug in a provider.

mod contacts;
mod definitions;
mod email;
mod wait;
mod webhook;

pub use contacts::{ContactBook, CreateContactAction, UpdateContactAction};
pub use definitions::{action_definitions, register_definitions, trigger_definitions};
pub use email::{EmailMessage, Mailer, Outbox, SendEmailAction};
pub use wait::WaitAction;
pub use webhook::SendWebhookAction;

use std::sync::Arc;
use trellisruntime::ActionRegistry;

/// Backends behind the built-in handlers, for inspection by callers
#[derive(Clone)]
pub struct Builtins {
    pub outbox: Arc<Outbox>,
    pub contacts: Arc<ContactBook>,
}

/// Register all standard actions with a registry
pub fn register_all(registry: &mut ActionRegistry) -> Builtins {
    let builtins = Builtins {
        outbox: Arc::new(Outbox::new()),
        contacts: Arc::new(ContactBook::new()),
    };

    registry.register(Arc::new(SendEmailAction::new(builtins.outbox.clone())));
    registry.register(Arc::new(CreateContactAction::new(builtins.contacts.clone())));
    registry.register(Arc::new(UpdateContactAction::new(builtins.contacts.clone())));
    registry.register(Arc::new(SendWebhookAction::new()));
    registry.register(Arc::new(WaitAction));

    builtins
}
