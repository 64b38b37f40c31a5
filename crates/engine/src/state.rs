//! Per-instance execution state: which actions ran and how they ended.
//!
//! The state is stored as a JSON blob on the instance row and is read,
//! modified and written back on every action invocation.  Status entries only
//! ever move forward:
//!
//! ```text
//! NotStarted ──► Scheduled ──► Completed
//!     │              │
//!     └──────────────┴───────► Failed
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// Lifecycle of one action within one workflow instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    #[default]
    NotStarted,
    Scheduled,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self → next` is a forward transition.
    pub fn can_transition_to(self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (NotStarted, Scheduled) | (NotStarted, Completed) | (NotStarted, Failed)
                | (Scheduled, Completed) | (Scheduled, Failed)
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::Scheduled  => write!(f, "SCHEDULED"),
            Self::Completed  => write!(f, "COMPLETED"),
            Self::Failed     => write!(f, "FAILED"),
        }
    }
}

/// Status entry owned by one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub action_id: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Action-id → status entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default)]
    actions: BTreeMap<String, ActionState>,
}

impl ExecutionState {
    /// Parse the blob stored on an instance.  An empty blob is a fresh state.
    pub fn decode(blob: &str) -> Result<Self, EngineError> {
        if blob.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(blob).map_err(EngineError::StateCorruption)
    }

    pub fn encode(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(EngineError::StateCorruption)
    }

    pub fn entry(&self, action_id: &str) -> Option<&ActionState> {
        self.actions.get(action_id)
    }

    /// Status of `action_id`; an action without an entry has not started.
    pub fn status_of(&self, action_id: &str) -> ActionStatus {
        self.entry(action_id).map(|e| e.status).unwrap_or_default()
    }

    pub fn has_completed(&self, action_id: &str) -> bool {
        self.status_of(action_id) == ActionStatus::Completed
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActionState> {
        self.actions.values()
    }

    /// Record that `action_id` has a deferred job booked for `fire_at`.
    pub fn mark_scheduled(
        &mut self,
        action_id: &str,
        job_id: Uuid,
        fire_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let entry = self.transition(action_id, ActionStatus::Scheduled)?;
        entry.job_id = Some(job_id);
        entry.scheduled_for = Some(fire_at);
        Ok(())
    }

    pub fn mark_completed(&mut self, action_id: &str) -> Result<(), EngineError> {
        self.transition(action_id, ActionStatus::Completed).map(|_| ())
    }

    pub fn mark_failed(&mut self, action_id: &str, error: impl Into<String>) -> Result<(), EngineError> {
        let entry = self.transition(action_id, ActionStatus::Failed)?;
        entry.error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, action_id: &str, next: ActionStatus) -> Result<&mut ActionState, EngineError> {
        let entry = self.actions.entry(action_id.to_owned()).or_insert_with(|| ActionState {
            action_id: action_id.to_owned(),
            status: ActionStatus::NotStarted,
            job_id: None,
            scheduled_for: None,
            error: None,
            updated_at: Utc::now(),
        });

        if !entry.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                action_id: action_id.to_owned(),
                from: entry.status,
                to: next,
            });
        }

        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_is_a_fresh_state() {
        let state = ExecutionState::decode("").unwrap();
        assert_eq!(state.status_of("create-eicr"), ActionStatus::NotStarted);
        assert!(state.entry("create-eicr").is_none());
    }

    #[test]
    fn encode_then_decode_reproduces_the_mapping() {
        let mut state = ExecutionState::default();
        state.mark_scheduled("create-eicr", Uuid::new_v4(), Utc::now()).unwrap();
        state.mark_completed("match-trigger").unwrap();
        state.mark_failed("validate", "schema rejected").unwrap();

        let decoded = ExecutionState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.status_of("validate"), ActionStatus::Failed);
    }

    #[test]
    fn status_is_serialized_in_screaming_case() {
        let mut state = ExecutionState::default();
        state.mark_completed("a").unwrap();
        assert!(state.encode().unwrap().contains("\"COMPLETED\""));
    }

    #[test]
    fn corrupt_blob_is_rejected() {
        assert!(matches!(
            ExecutionState::decode("{not json"),
            Err(EngineError::StateCorruption(_))
        ));
    }

    #[test]
    fn transitions_never_regress() {
        let mut state = ExecutionState::default();
        state.mark_scheduled("a", Uuid::new_v4(), Utc::now()).unwrap();
        state.mark_completed("a").unwrap();

        assert!(matches!(
            state.mark_scheduled("a", Uuid::new_v4(), Utc::now()),
            Err(EngineError::InvalidTransition { from: ActionStatus::Completed, to: ActionStatus::Scheduled, .. })
        ));
        assert!(state.mark_failed("a", "late").is_err());
        assert_eq!(state.status_of("a"), ActionStatus::Completed);
    }

    #[test]
    fn scheduling_twice_is_rejected() {
        let mut state = ExecutionState::default();
        state.mark_scheduled("a", Uuid::new_v4(), Utc::now()).unwrap();
        assert!(state.mark_scheduled("a", Uuid::new_v4(), Utc::now()).is_err());
    }
}
