//! The handle for one pending deferred execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use db::models::JobRow;

/// Re-invoke `action_id` on `instance_id` once `fire_at` has passed.
///
/// Carries identifiers only; whoever handles the job reloads the instance's
/// current state when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub action_id: String,
    pub fire_at: DateTime<Utc>,
}

impl From<JobRow> for ScheduledJob {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            instance_id: row.instance_id,
            action_id: row.action_id,
            fire_at: row.fire_at,
        }
    }
}
