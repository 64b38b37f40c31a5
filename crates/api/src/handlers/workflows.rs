use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: Option<String>,
    /// Action ids in dependency order.
    pub actions: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<WorkflowSummary>> {
    let registry = state.engine.registry();
    let workflows = registry
        .names()
        .filter_map(|name| registry.get(name).ok())
        .map(|wf| WorkflowSummary {
            name: wf.definition.name.clone(),
            description: wf.definition.description.clone(),
            actions: wf.order.clone(),
        })
        .collect();
    Json(workflows)
}
