//! Related-action gating.
//!
//! Only `after` links gate: the action waits until every referenced action is
//! `COMPLETED`.  A reference with no state entry counts as not completed.

use crate::models::{RelatedAction, RelationshipKind};
use crate::state::ExecutionState;

/// Whether a single link is satisfied by `state`.
pub fn is_satisfied(link: &RelatedAction, state: &ExecutionState) -> bool {
    match link.relationship {
        RelationshipKind::After => state.has_completed(&link.action_id),
        RelationshipKind::Before | RelationshipKind::Concurrent => true,
    }
}

/// Ids of the `after` predecessors that have not completed yet, in
/// declaration order.  Empty means the action may proceed.
pub fn unmet_dependencies<'a>(links: &'a [RelatedAction], state: &ExecutionState) -> Vec<&'a str> {
    links
        .iter()
        .filter(|link| !is_satisfied(link, state))
        .map(|link| link.action_id.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn missing_entry_blocks_an_after_link() {
        let state = ExecutionState::default();
        assert_eq!(unmet_dependencies(&[RelatedAction::after("a")], &state), vec!["a"]);
    }

    #[test]
    fn scheduled_predecessor_still_blocks() {
        let mut state = ExecutionState::default();
        state.mark_scheduled("a", Uuid::new_v4(), Utc::now()).unwrap();
        assert!(!is_satisfied(&RelatedAction::after("a"), &state));
    }

    #[test]
    fn failed_predecessor_blocks() {
        let mut state = ExecutionState::default();
        state.mark_failed("a", "boom").unwrap();
        assert!(!is_satisfied(&RelatedAction::after("a"), &state));
    }

    #[test]
    fn all_after_links_must_be_completed() {
        let mut state = ExecutionState::default();
        state.mark_completed("a").unwrap();
        let links = [RelatedAction::after("a"), RelatedAction::after("b")];
        assert_eq!(unmet_dependencies(&links, &state), vec!["b"]);

        state.mark_completed("b").unwrap();
        assert!(unmet_dependencies(&links, &state).is_empty());
    }

    #[test]
    fn non_after_links_never_block() {
        let state = ExecutionState::default();
        let links = [
            RelatedAction { action_id: "x".into(), relationship: RelationshipKind::Before },
            RelatedAction { action_id: "y".into(), relationship: RelationshipKind::Concurrent },
        ];
        assert!(unmet_dependencies(&links, &state).is_empty());
    }
}
