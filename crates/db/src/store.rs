//! Storage seams used by the engine and the timer queue.
//!
//! [`PgStore`] delegates to the repository functions; [`crate::MemoryStore`]
//! keeps everything in process for tests and single-node runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{JobRow, JobStatus, ReportRow, WorkflowInstanceRow},
    repository::{instances, jobs, reports},
};

/// Durable record of workflow instances, their execution state and the
/// documents they produced.
///
/// `save_state` and `record_outcome` must be durable before they return.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn create_instance(&self, instance: WorkflowInstanceRow) -> Result<WorkflowInstanceRow, DbError>;

    async fn get_instance(&self, id: Uuid) -> Result<WorkflowInstanceRow, DbError>;

    async fn list_instances(&self) -> Result<Vec<WorkflowInstanceRow>, DbError>;

    /// Serialized execution state of an instance.
    async fn load_state(&self, id: Uuid) -> Result<String, DbError> {
        Ok(self.get_instance(id).await?.state)
    }

    async fn save_state(&self, id: Uuid, state: &str) -> Result<(), DbError>;

    /// Store a finished action's state and the report it produced as one
    /// unit: both are written or neither is.
    async fn record_outcome(&self, id: Uuid, state: &str, report: Option<ReportRow>) -> Result<(), DbError>;

    async fn list_reports(&self, instance_id: Uuid) -> Result<Vec<ReportRow>, DbError>;
}

/// Durable deferred-job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: JobRow) -> Result<JobRow, DbError>;

    async fn delete_job(&self, job_id: Uuid) -> Result<(), DbError>;

    async fn set_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), DbError>;

    /// Jobs that must be re-armed after a restart, earliest `fire_at` first.
    async fn recoverable_jobs(&self) -> Result<Vec<JobRow>, DbError>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for PgStore {
    async fn create_instance(&self, instance: WorkflowInstanceRow) -> Result<WorkflowInstanceRow, DbError> {
        instances::create_instance(&self.pool, &instance).await
    }

    async fn get_instance(&self, id: Uuid) -> Result<WorkflowInstanceRow, DbError> {
        instances::get_instance(&self.pool, id).await
    }

    async fn list_instances(&self) -> Result<Vec<WorkflowInstanceRow>, DbError> {
        instances::list_instances(&self.pool).await
    }

    async fn save_state(&self, id: Uuid, state: &str) -> Result<(), DbError> {
        instances::update_state(&self.pool, id, state).await
    }

    async fn record_outcome(&self, id: Uuid, state: &str, report: Option<ReportRow>) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        if let Some(report) = &report {
            reports::insert_report(&mut *tx, report).await?;
        }
        instances::update_state(&mut *tx, id, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_reports(&self, instance_id: Uuid) -> Result<Vec<ReportRow>, DbError> {
        reports::list_reports(&self.pool, instance_id).await
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, job: JobRow) -> Result<JobRow, DbError> {
        jobs::insert_job(&self.pool, &job).await
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<(), DbError> {
        jobs::delete_job(&self.pool, job_id).await
    }

    async fn set_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), DbError> {
        jobs::set_job_status(&self.pool, job_id, status).await
    }

    async fn recoverable_jobs(&self) -> Result<Vec<JobRow>, DbError> {
        jobs::recoverable_jobs(&self.pool).await
    }
}
