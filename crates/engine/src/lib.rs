//! `engine` crate: workflow-definition models, validation, and the
//! event-condition-action engine that decides whether, when and in what order
//! each action of a reporting workflow runs.

pub mod action;
pub mod condition;
pub mod dag;
pub mod error;
pub mod executor;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod state;
pub mod timing;

pub use condition::Precondition;
pub use dag::validate_workflow;
pub use error::{EngineError, EvaluationError};
pub use executor::{ActionResult, BlockReason, Engine, EngineConfig, ExecuteOutcome};
pub use models::{ActionDefinition, ActionKind, RelatedAction, RelationshipKind, TimingSpec, WorkflowDefinition};
pub use registry::{Collaborators, WorkflowRegistry};
pub use scheduler::{QueueScheduler, TimingScheduler};
pub use state::{ActionState, ActionStatus, ExecutionState};
