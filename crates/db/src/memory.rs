//! In-process store used by tests and by `serve` when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    DbError,
    models::{JobRow, JobStatus, ReportRow, WorkflowInstanceRow},
    store::{InstanceStore, JobStore},
};

/// Implements both store traits over `RwLock`ed maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    instances: RwLock<HashMap<Uuid, WorkflowInstanceRow>>,
    jobs: RwLock<HashMap<Uuid, JobRow>>,
    reports: RwLock<Vec<ReportRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job record, in no particular order.
    pub async fn jobs(&self) -> Vec<JobRow> {
        self.jobs.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn create_instance(&self, instance: WorkflowInstanceRow) -> Result<WorkflowInstanceRow, DbError> {
        self.instances.write().await.insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn get_instance(&self, id: Uuid) -> Result<WorkflowInstanceRow, DbError> {
        self.instances.read().await.get(&id).cloned().ok_or_else(|| DbError::instance_not_found(id))
    }

    async fn list_instances(&self) -> Result<Vec<WorkflowInstanceRow>, DbError> {
        let mut rows: Vec<_> = self.instances.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn save_state(&self, id: Uuid, state: &str) -> Result<(), DbError> {
        let mut instances = self.instances.write().await;
        let row = instances.get_mut(&id).ok_or_else(|| DbError::instance_not_found(id))?;
        row.state = state.to_owned();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn record_outcome(&self, id: Uuid, state: &str, report: Option<ReportRow>) -> Result<(), DbError> {
        let mut instances = self.instances.write().await;
        let row = instances.get_mut(&id).ok_or_else(|| DbError::instance_not_found(id))?;
        if let Some(report) = report {
            self.reports.write().await.push(report);
        }
        row.state = state.to_owned();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn list_reports(&self, instance_id: Uuid) -> Result<Vec<ReportRow>, DbError> {
        Ok(self
            .reports
            .read()
            .await
            .iter()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, mut job: JobRow) -> Result<JobRow, DbError> {
        job.status = JobStatus::Pending.to_string();
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<(), DbError> {
        self.jobs.write().await.remove(&job_id);
        Ok(())
    }

    async fn set_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), DbError> {
        let mut jobs = self.jobs.write().await;
        let row = jobs.get_mut(&job_id).ok_or_else(|| DbError::job_not_found(job_id))?;
        row.status = status.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn recoverable_jobs(&self) -> Result<Vec<JobRow>, DbError> {
        let mut rows: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.job_status().is_some_and(JobStatus::is_recoverable))
            .cloned()
            .collect();
        rows.sort_by_key(|j| j.fire_at);
        Ok(rows)
    }
}
