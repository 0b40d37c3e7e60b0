//! Workflow execution runtime
//!
//! This crate provides the execution engine that walks workflow graphs,
//! the action handler registry, the persistence boundary and the service
//! that ties them together behind validated CRUD and a trigger entry point.

mod executor;
mod registry;
mod retry;
mod runtime;
mod store;

pub use executor::{WorkflowExecutor, CONDITION_RESULT_KEY, VARIABLES_KEY};
pub use registry::ActionRegistry;
pub use retry::run_with_retry;
pub use runtime::{AutomationService, EngineConfig, ExecutionHandle};
pub use store::{InMemoryStore, WorkflowStore};
