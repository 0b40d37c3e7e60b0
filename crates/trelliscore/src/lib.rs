//! Core abstractions for the automation engine
//!
//! Workflow graph model, execution records, the validator, the template
//! interpolator and the condition language. Nothing here performs I/O.

mod action;
pub mod condition;
mod definitions;
mod error;
pub mod events;
mod execution;
pub mod template;
pub mod validation;
mod value;
mod workflow;

pub use action::{ActionContext, ActionHandler};
pub use condition::{ConditionEvaluator, GuardFallback};
pub use definitions::{ActionDefinition, DefinitionCatalog, TriggerDefinition};
pub use error::{AutomationError, NodeError, NotFound, StoreError, ValidationError, ValidationErrors};
pub use events::{EventBus, EventEmitter, ExecutionEvent, NodeMessage};
pub use execution::{Execution, ExecutionId, ExecutionStatus, LogEntry, LogStatus};
pub use template::interpolate;
pub use validation::{validate, validate_connection};
pub use value::{into_payload, lookup_path, merge, render, Payload};
pub use workflow::{
    Connection, ConnectionId, ErrorHandling, ExecutionOutcome, Node, NodeId, NodeKind, NodeStatus,
    NodeType, Position, RetryPolicy, Statistics, TriggerType, Workflow, WorkflowId, WorkflowSettings,
    WorkflowStatus,
};

/// Result type for automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;
