//! Workflow-instance repository functions.

use chrono::Utc;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbError, models::WorkflowInstanceRow};

/// Insert a new workflow instance.
pub async fn create_instance(
    pool: &PgPool,
    instance: &WorkflowInstanceRow,
) -> Result<WorkflowInstanceRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowInstanceRow>(
        r#"
        INSERT INTO workflow_instances
            (id, workflow, context, fhir_version, state, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, workflow, context, fhir_version, state, created_at, updated_at
        "#,
    )
    .bind(instance.id)
    .bind(&instance.workflow)
    .bind(&instance.context)
    .bind(&instance.fhir_version)
    .bind(&instance.state)
    .bind(instance.created_at)
    .bind(instance.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single instance by its primary key.
pub async fn get_instance(pool: &PgPool, id: Uuid) -> Result<WorkflowInstanceRow, DbError> {
    sqlx::query_as::<_, WorkflowInstanceRow>(
        r#"
        SELECT id, workflow, context, fhir_version, state, created_at, updated_at
        FROM workflow_instances WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::instance_not_found(id))
}

/// Return all instances ordered by creation time (newest first).
pub async fn list_instances(pool: &PgPool) -> Result<Vec<WorkflowInstanceRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowInstanceRow>(
        r#"
        SELECT id, workflow, context, fhir_version, state, created_at, updated_at
        FROM workflow_instances ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the serialized execution state of an instance.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn update_state<'e>(executor: impl PgExecutor<'e>, id: Uuid, state: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE workflow_instances SET state = $1, updated_at = $2 WHERE id = $3")
        .bind(state)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::instance_not_found(id));
    }

    Ok(())
}
