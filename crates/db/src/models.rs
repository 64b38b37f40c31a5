//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflow_instances
// ---------------------------------------------------------------------------

/// One in-flight reporting episode.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowInstanceRow {
    pub id: Uuid,
    /// Name of the workflow definition this instance runs.
    pub workflow: String,
    /// Launch/session handle and event data the collaborators need to resume work.
    pub context: serde_json::Value,
    pub fhir_version: String,
    /// Serialized execution state. Empty until the first transition is persisted.
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstanceRow {
    pub fn new(workflow: impl Into<String>, context: serde_json::Value, fhir_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow: workflow.into(),
            context,
            fhir_version: fhir_version.into(),
            state: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// scheduled_jobs
// ---------------------------------------------------------------------------

/// Possible statuses for a deferred job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Booked; the timer has not gone off yet.
    Pending,
    /// The timer went off and the job was handed to a worker.
    Fired,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether a record in this status must be re-armed after a restart.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Pending | Self::Fired)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending   => write!(f, "pending"),
            Self::Fired     => write!(f, "fired"),
            Self::Completed => write!(f, "completed"),
            Self::Failed    => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "fired"     => Ok(Self::Fired),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A durable deferred-execution record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub action_id: String,
    pub fire_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    /// Parsed status; unknown strings are treated as not recoverable.
    pub fn job_status(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// reports
// ---------------------------------------------------------------------------

/// A generated clinical document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub action_id: String,
    pub document: String,
    /// Validation verdict; `None` when the action did not ask for validation.
    pub valid: Option<bool>,
    pub created_at: DateTime<Utc>,
}
