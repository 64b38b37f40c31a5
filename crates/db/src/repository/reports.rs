//! Generated-report repository functions.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbError, models::ReportRow};

/// Insert a generated document.  Runs on a pool or inside a transaction.
pub async fn insert_report<'e>(executor: impl PgExecutor<'e>, report: &ReportRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO reports (id, instance_id, action_id, document, valid, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(report.id)
    .bind(report.instance_id)
    .bind(&report.action_id)
    .bind(&report.document)
    .bind(report.valid)
    .bind(report.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Reports generated for one instance, oldest first.
pub async fn list_reports(pool: &PgPool, instance_id: Uuid) -> Result<Vec<ReportRow>, DbError> {
    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT id, instance_id, action_id, document, valid, created_at
        FROM reports WHERE instance_id = $1 ORDER BY created_at ASC
        "#,
    )
    .bind(instance_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
