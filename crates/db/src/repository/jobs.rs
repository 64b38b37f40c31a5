//! Scheduled-job repository functions.
//!
//! A job row is written when a deferred execution is booked and survives
//! process restarts; the timer queue re-arms every `pending` or `fired` row
//! on startup.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::{JobRow, JobStatus}};

/// Insert a booked job in `pending` status.
pub async fn insert_job(pool: &PgPool, job: &JobRow) -> Result<JobRow, DbError> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO scheduled_jobs
            (id, instance_id, action_id, fire_at, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING id, instance_id, action_id, fire_at, status, created_at, updated_at
        "#,
    )
    .bind(job.id)
    .bind(job.instance_id)
    .bind(&job.action_id)
    .bind(job.fire_at)
    .bind(JobStatus::Pending.to_string())
    .bind(job.created_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Remove a job that was booked but never armed.
pub async fn delete_job(pool: &PgPool, job_id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move a job to `status`.
pub async fn set_job_status(pool: &PgPool, job_id: Uuid, status: JobStatus) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE scheduled_jobs SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(job_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::job_not_found(job_id));
    }

    Ok(())
}

/// All jobs that still have to fire (or were fired but never finished),
/// earliest first.
pub async fn recoverable_jobs(pool: &PgPool) -> Result<Vec<JobRow>, DbError> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, instance_id, action_id, fire_at, status, created_at, updated_at
        FROM scheduled_jobs
        WHERE status IN ('pending', 'fired')
        ORDER BY fire_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
