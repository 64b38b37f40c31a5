//! Workflow validation. Run this before registering a workflow.
//!
//! Rules enforced:
//! 1. Action IDs must be unique within the workflow.
//! 2. Every related action must reference an existing action other than itself.
//! 3. The graph of `after` links must be acyclic (topological sort must succeed).
//! 4. Every timing spec must be able to produce a fire time.
//! 5. Look-back windows stay within [`MAX_LOOKBACK_HOURS`].
//!
//! Returns the action IDs in an order where every action follows the actions
//! it runs `after`; ties keep declaration order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    EngineError,
    models::{ActionKind, RelationshipKind, WorkflowDefinition, MAX_LOOKBACK_HOURS},
    timing,
};

/// Validate the workflow and return its actions in dependency order.
///
/// # Errors
/// - [`EngineError::DuplicateActionId`] if two actions share an ID.
/// - [`EngineError::UnknownActionReference`] if a link references a missing action.
/// - [`EngineError::CycleDetected`] if the `after` links form a cycle.
/// - [`EngineError::InvalidTiming`] if a cron expression does not parse.
/// - [`EngineError::LookbackTooLong`] if a report window exceeds [`MAX_LOOKBACK_HOURS`].
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure action IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for action in &workflow.actions {
        if !seen_ids.insert(action.id.as_str()) {
            return Err(EngineError::DuplicateActionId(action.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate link targets, timing and report windows
    // -----------------------------------------------------------------------
    for action in &workflow.actions {
        for link in &action.related_actions {
            if link.action_id == action.id {
                return Err(EngineError::CycleDetected(workflow.name.clone()));
            }
            if !seen_ids.contains(link.action_id.as_str()) {
                return Err(EngineError::UnknownActionReference {
                    action_id: action.id.clone(),
                    target: link.action_id.clone(),
                });
            }
        }
        for spec in &action.timing {
            timing::validate(spec)?;
        }
        if let ActionKind::CreateReport { lookback_hours, .. } = action.kind {
            if lookback_hours > MAX_LOOKBACK_HOURS {
                return Err(EngineError::LookbackTooLong {
                    action_id: action.id.clone(),
                    hours: lookback_hours,
                    max: MAX_LOOKBACK_HOURS,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort over `after` links (Kahn's algorithm)
    // -----------------------------------------------------------------------
    // An `after X` link on action A is the edge X → A.
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for action in &workflow.actions {
        in_degree.entry(action.id.as_str()).or_insert(0);
        for link in &action.related_actions {
            if link.relationship == RelationshipKind::After {
                dependents
                    .entry(link.action_id.as_str())
                    .or_default()
                    .push(action.id.as_str());
                *in_degree.entry(action.id.as_str()).or_insert(0) += 1;
            }
        }
    }

    // Seed with actions that wait on nothing, in declaration order.
    let mut queue: VecDeque<&str> = workflow
        .actions
        .iter()
        .map(|a| a.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(workflow.actions.len());

    while let Some(action_id) = queue.pop_front() {
        sorted.push(action_id.to_owned());

        if let Some(waiting) = dependents.get(action_id) {
            for &dependent in waiting {
                let deg = in_degree.entry(dependent).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    // If we didn't visit every action the graph contains a cycle.
    if sorted.len() != workflow.actions.len() {
        return Err(EngineError::CycleDetected(workflow.name.clone()));
    }

    Ok(sorted)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionDefinition, ActionKind, RelatedAction, TimingSpec};

    fn action(id: &str) -> ActionDefinition {
        ActionDefinition::new(id, ActionKind::Checkpoint)
    }

    fn workflow(actions: Vec<ActionDefinition>) -> WorkflowDefinition {
        WorkflowDefinition::new("test", actions)
    }

    #[test]
    fn linear_chain_returns_dependency_order() {
        // c after b after a, declared backwards
        let wf = workflow(vec![
            action("c").with_related(RelatedAction::after("b")),
            action("b").with_related(RelatedAction::after("a")),
            action("a"),
        ]);

        let sorted = validate_workflow(&wf).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_dependencies() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let wf = workflow(vec![
            action("a"),
            action("b").with_related(RelatedAction::after("a")),
            action("c").with_related(RelatedAction::after("a")),
            action("d")
                .with_related(RelatedAction::after("b"))
                .with_related(RelatedAction::after("c")),
        ]);

        let sorted = validate_workflow(&wf).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn independent_actions_keep_declaration_order() {
        let wf = workflow(vec![action("z"), action("m"), action("a")]);
        assert_eq!(validate_workflow(&wf).unwrap(), vec!["z", "m", "a"]);
    }

    #[test]
    fn before_links_do_not_order() {
        let wf = workflow(vec![
            action("a").with_related(RelatedAction {
                action_id: "b".into(),
                relationship: RelationshipKind::Before,
            }),
            action("b"),
        ]);
        assert_eq!(validate_workflow(&wf).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_action_id_is_rejected() {
        let wf = workflow(vec![action("a"), action("a")]);
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::DuplicateActionId(id)) if id == "a"
        ));
    }

    #[test]
    fn link_to_missing_action_is_rejected() {
        let wf = workflow(vec![action("a").with_related(RelatedAction::after("ghost"))]);
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::UnknownActionReference { target, .. }) if target == "ghost"
        ));
    }

    #[test]
    fn cycle_is_detected() {
        // a after c, b after a, c after b
        let wf = workflow(vec![
            action("a").with_related(RelatedAction::after("c")),
            action("b").with_related(RelatedAction::after("a")),
            action("c").with_related(RelatedAction::after("b")),
        ]);
        assert!(matches!(validate_workflow(&wf), Err(EngineError::CycleDetected(_))));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let wf = workflow(vec![action("a").with_related(RelatedAction::after("a"))]);
        assert!(matches!(validate_workflow(&wf), Err(EngineError::CycleDetected(_))));
    }

    #[test]
    fn bad_cron_is_rejected() {
        let wf = workflow(vec![
            action("a").with_timing(TimingSpec::Cron { expression: "every tuesday".into() }),
        ]);
        assert!(matches!(validate_workflow(&wf), Err(EngineError::InvalidTiming(_))));
    }

    #[test]
    fn oversized_lookback_is_rejected() {
        let report = |hours| ActionDefinition::new("r", ActionKind::CreateReport { lookback_hours: hours, validate: false });

        assert!(validate_workflow(&workflow(vec![report(MAX_LOOKBACK_HOURS)])).is_ok());
        assert!(matches!(
            validate_workflow(&workflow(vec![report(u32::MAX)])),
            Err(EngineError::LookbackTooLong { hours: u32::MAX, .. })
        ));
    }
}
