use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use db::models::{ReportRow, WorkflowInstanceRow};
use engine::{ActionResult, ActionState, ExecuteOutcome};

use crate::{error::ApiError, AppState};

fn default_fhir_version() -> String {
    "R4".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct CreateInstanceDto {
    pub workflow: String,
    /// Launch context: patient, encounter and trigger codes.
    #[serde(default)]
    pub context: Value,
    #[serde(default = "default_fhir_version")]
    pub fhir_version: String,
}

#[derive(Debug, Serialize)]
pub struct InstanceView {
    pub id: Uuid,
    pub workflow: String,
    pub fhir_version: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<ActionState>,
    pub reports: Vec<ReportRow>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeView {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecuteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ActionResult> for OutcomeView {
    fn from(result: ActionResult) -> Self {
        match result.outcome {
            Ok(outcome) => Self { action_id: result.action_id, outcome: Some(outcome), error: None },
            Err(e) => Self { action_id: result.action_id, outcome: None, error: Some(e.to_string()) },
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateInstanceDto>,
) -> Result<(StatusCode, Json<WorkflowInstanceRow>), ApiError> {
    let row = state
        .engine
        .create_instance(&payload.workflow, payload.context, &payload.fhir_version)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<WorkflowInstanceRow>>, ApiError> {
    Ok(Json(state.engine.instances().await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<InstanceView>, ApiError> {
    let instance = state.engine.instance(id).await?;
    let execution = engine::ExecutionState::decode(&instance.state)?;
    let reports = state.engine.reports(id).await?;

    Ok(Json(InstanceView {
        id: instance.id,
        workflow: instance.workflow,
        fhir_version: instance.fhir_version,
        context: instance.context,
        created_at: instance.created_at,
        actions: execution.entries().cloned().collect(),
        reports,
    }))
}

/// Offer a clinical event to every action of the instance.
pub async fn trigger(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Vec<OutcomeView>>), ApiError> {
    let results = state.engine.trigger(id).await?;
    Ok((StatusCode::ACCEPTED, Json(results.into_iter().map(OutcomeView::from).collect())))
}

/// Invoke a single action of the instance.
pub async fn execute_action(
    Path((id, action_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ExecuteOutcome>), ApiError> {
    let outcome = state.engine.execute(id, &action_id).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}
