//! The timing-scheduler seam.
//!
//! Scheduling is split in three so the engine can persist `SCHEDULED` between
//! booking the job and starting its timer:
//!
//! 1. [`TimingScheduler::book`] turns the spec into a fire time and records a
//!    durable job; nothing fires yet.
//! 2. The engine persists the new execution state.
//! 3. [`TimingScheduler::arm`] starts the timer.  If step 2 failed the engine
//!    calls [`TimingScheduler::discard`] instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use queue::{ScheduledJob, TimerQueue};

use crate::{EngineError, models::TimingSpec, timing};

#[async_trait]
pub trait TimingScheduler: Send + Sync {
    /// Book a deferred re-invocation of `action_id` on `instance_id`.
    async fn book(
        &self,
        instance_id: Uuid,
        action_id: &str,
        spec: &TimingSpec,
    ) -> Result<ScheduledJob, EngineError>;

    /// Start the timer of a booked job.
    async fn arm(&self, job: ScheduledJob);

    /// Forget a booked job that was never armed.
    async fn discard(&self, job: &ScheduledJob) -> Result<(), EngineError>;
}

/// [`TimingScheduler`] backed by the durable [`TimerQueue`].
#[derive(Clone)]
pub struct QueueScheduler {
    queue: Arc<TimerQueue>,
}

impl QueueScheduler {
    pub fn new(queue: Arc<TimerQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl TimingScheduler for QueueScheduler {
    async fn book(
        &self,
        instance_id: Uuid,
        action_id: &str,
        spec: &TimingSpec,
    ) -> Result<ScheduledJob, EngineError> {
        let refused = |message: String| EngineError::Scheduling {
            action_id: action_id.to_owned(),
            message,
        };
        let fire_at = timing::next_fire_time(spec, Utc::now()).map_err(|e| refused(e.to_string()))?;
        self.queue
            .book(instance_id, action_id, fire_at)
            .await
            .map_err(|e| refused(e.to_string()))
    }

    async fn arm(&self, job: ScheduledJob) {
        info!(job_id = %job.id, action_id = %job.action_id, fire_at = %job.fire_at, "job scheduled");
        self.queue.arm(job);
    }

    async fn discard(&self, job: &ScheduledJob) -> Result<(), EngineError> {
        self.queue.discard(job.id).await.map_err(|e| EngineError::Scheduling {
            action_id: job.action_id.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::{JobStore, MemoryStore};
    use queue::QueueConfig;

    fn scheduler(max_pending: usize) -> (QueueScheduler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let jobs: Arc<dyn JobStore> = store.clone();
        let (queue, _rx) = TimerQueue::new(jobs, QueueConfig { max_pending, channel_capacity: 8 });
        (QueueScheduler::new(Arc::new(queue)), store)
    }

    #[tokio::test]
    async fn unusable_timing_is_a_scheduling_error() {
        let (scheduler, store) = scheduler(10);
        let spec = TimingSpec::Cron { expression: "not a schedule".into() };

        let err = scheduler.book(Uuid::new_v4(), "a", &spec).await.unwrap_err();

        assert!(matches!(err, EngineError::Scheduling { ref action_id, .. } if action_id == "a"));
        assert!(store.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn full_queue_is_a_scheduling_error() {
        let (scheduler, _) = scheduler(0);
        let spec = TimingSpec::Delay { seconds: 10 };

        let err = scheduler.book(Uuid::new_v4(), "a", &spec).await.unwrap_err();
        assert!(matches!(err, EngineError::Scheduling { .. }));
    }

    #[tokio::test]
    async fn booked_job_fires_at_the_computed_time() {
        let (scheduler, store) = scheduler(10);
        let before = Utc::now();

        let job = scheduler.book(Uuid::new_v4(), "a", &TimingSpec::Delay { seconds: 60 }).await.unwrap();

        assert!(job.fire_at >= before + chrono::Duration::seconds(60));
        assert_eq!(store.jobs().await.len(), 1);
    }
}
