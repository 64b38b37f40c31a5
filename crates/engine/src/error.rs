//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::state::ActionStatus;

/// A precondition could not be evaluated because the context lacks the data
/// it inspects.  Treated like an unmet precondition by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("context has no value at '{pointer}'")]
    MissingData { pointer: String },

    #[error("value at '{pointer}' is not a {expected}")]
    WrongType {
        pointer: String,
        expected: &'static str,
    },
}

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Definition errors ------

    /// Two or more actions share the same ID.
    #[error("duplicate action ID: '{0}'")]
    DuplicateActionId(String),

    /// A related action references an ID that doesn't exist in the workflow.
    #[error("action '{action_id}' references unknown action '{target}'")]
    UnknownActionReference {
        action_id: String,
        target: String,
    },

    /// The `after` graph contains a cycle.
    #[error("workflow '{0}' has cyclic `after` dependencies")]
    CycleDetected(String),

    #[error("invalid timing: {0}")]
    InvalidTiming(String),

    #[error("action '{action_id}' looks back {hours} hours; at most {max} are allowed")]
    LookbackTooLong {
        action_id: String,
        hours: u32,
        max: u32,
    },

    #[error("cannot load workflow definitions: {0}")]
    Definition(String),

    // ------ Lookup errors ------

    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    #[error("workflow '{workflow}' has no action '{action_id}'")]
    UnknownAction {
        workflow: String,
        action_id: String,
    },

    #[error("workflow instance {0} not found")]
    InstanceNotFound(Uuid),

    // ------ Execution errors ------

    /// The execution state blob could not be (de)serialized.
    #[error("execution state is corrupt: {0}")]
    StateCorruption(#[source] serde_json::Error),

    /// An attempted status change would move an action backwards.
    #[error("action '{action_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        action_id: String,
        from: ActionStatus,
        to: ActionStatus,
    },

    /// The timer queue refused the job; no state was changed.
    #[error("could not schedule action '{action_id}': {message}")]
    Scheduling {
        action_id: String,
        message: String,
    },

    /// Domain work failed; the action was marked `FAILED`.
    #[error("action '{action_id}' failed: {message}")]
    DomainExecution {
        action_id: String,
        message: String,
    },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
