//! Workflow-definition models.
//!
//! Definitions are static data: they are loaded from JSON once, validated
//! with [`crate::dag::validate_workflow`] and never mutated afterwards.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::Precondition;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

fn default_lookback_hours() -> u32 {
    24
}

/// Longest look-back window a `create_report` action may ask for (ten years).
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 366 * 10;

/// What an action does once it is allowed to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Fetch clinical data for the look-back window, generate a report and
    /// optionally validate it.
    CreateReport {
        #[serde(default = "default_lookback_hours")]
        lookback_hours: u32,
        #[serde(default)]
        validate: bool,
    },
    /// No domain work; completes as soon as its gates open.  Useful as an
    /// anchor other actions can run `after`.
    Checkpoint,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateReport { .. } => "create_report",
            Self::Checkpoint => "checkpoint",
        }
    }
}

// ---------------------------------------------------------------------------
// RelatedAction
// ---------------------------------------------------------------------------

/// How an action relates to another one.  Only `After` gates execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    After,
    Before,
    Concurrent,
}

/// A declared dependency on another action of the same workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedAction {
    pub action_id: String,
    pub relationship: RelationshipKind,
}

impl RelatedAction {
    pub fn after(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), relationship: RelationshipKind::After }
    }
}

// ---------------------------------------------------------------------------
// TimingSpec
// ---------------------------------------------------------------------------

/// Declarative deferral rule, turned into a fire time by [`crate::timing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimingSpec {
    /// Fire `seconds` after scheduling.
    Delay { seconds: u64 },
    /// Fire at the next occurrence of a cron expression (UTC).
    Cron { expression: String },
}

// ---------------------------------------------------------------------------
// ActionDefinition
// ---------------------------------------------------------------------------

/// One action of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique within the workflow (referenced by related actions).
    pub id: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub related_actions: Vec<RelatedAction>,
    /// Only the first entry is honoured.
    #[serde(default)]
    pub timing: Vec<TimingSpec>,
}

impl ActionDefinition {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            preconditions: Vec::new(),
            related_actions: Vec::new(),
            timing: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn with_related(mut self, related: RelatedAction) -> Self {
        self.related_actions.push(related);
        self
    }

    pub fn with_timing(mut self, timing: TimingSpec) -> Self {
        self.timing.push(timing);
        self
    }

    /// Log the whole definition at debug level.
    pub fn describe(&self) {
        debug!(
            action_id = %self.id,
            kind = self.kind.name(),
            preconditions = self.preconditions.len(),
            related = ?self.related_actions,
            timing = ?self.timing,
            "action definition"
        );
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub actions: Vec<ActionDefinition>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, actions: Vec<ActionDefinition>) -> Self {
        Self { name: name.into(), description: None, actions }
    }

    pub fn action(&self, id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == id)
    }
}
