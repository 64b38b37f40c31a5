//! Booking and arming of deferred jobs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use db::{models::{JobRow, JobStatus}, JobStore};

use crate::{QueueError, ScheduledJob};

/// Tuning knobs for the timer queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of armed timers; booking beyond this fails with
    /// [`QueueError::Full`].
    pub max_pending: usize,
    /// Capacity of the channel between timers and the worker pool.
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_pending: 10_000,
            channel_capacity: 256,
        }
    }
}

/// Books job records and runs their timers.
#[derive(Clone)]
pub struct TimerQueue {
    store: Arc<dyn JobStore>,
    due_tx: mpsc::Sender<ScheduledJob>,
    armed: Arc<AtomicUsize>,
    config: QueueConfig,
}

impl TimerQueue {
    /// Create a queue and the receiving end of its due channel.
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> (Self, mpsc::Receiver<ScheduledJob>) {
        let (due_tx, due_rx) = mpsc::channel(config.channel_capacity);
        let queue = Self {
            store,
            due_tx,
            armed: Arc::new(AtomicUsize::new(0)),
            config,
        };
        (queue, due_rx)
    }

    /// Number of timers currently running.
    pub fn armed(&self) -> usize {
        self.armed.load(Ordering::SeqCst)
    }

    /// Persist a `pending` job record. The job does not fire until [`arm`](Self::arm)ed.
    #[instrument(skip(self))]
    pub async fn book(
        &self,
        instance_id: Uuid,
        action_id: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduledJob, QueueError> {
        let armed = self.armed();
        if armed >= self.config.max_pending {
            return Err(QueueError::Full(armed));
        }

        let now = Utc::now();
        let row = self
            .store
            .insert_job(JobRow {
                id: Uuid::new_v4(),
                instance_id,
                action_id: action_id.to_owned(),
                fire_at,
                status: JobStatus::Pending.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        debug!(job_id = %row.id, %fire_at, "job booked");
        Ok(row.into())
    }

    /// Start the timer for a booked job.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, job: ScheduledJob) {
        let store = Arc::clone(&self.store);
        let due_tx = self.due_tx.clone();
        let armed = Arc::clone(&self.armed);
        armed.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let delay = (job.fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
            armed.fetch_sub(1, Ordering::SeqCst);

            if let Err(e) = store.set_job_status(job.id, JobStatus::Fired).await {
                warn!(job_id = %job.id, error = %e, "could not mark job as fired");
            }

            debug!(job_id = %job.id, action_id = %job.action_id, "job due");
            if due_tx.send(job).await.is_err() {
                warn!("due channel closed; worker pool is gone");
            }
        });
    }

    /// Drop a booked job that will never be armed.
    pub async fn discard(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.store.delete_job(job_id).await?;
        debug!(%job_id, "booked job discarded");
        Ok(())
    }

    /// Re-arm every outstanding job record. Returns the number re-armed.
    ///
    /// Jobs whose `fire_at` already passed fire immediately.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let rows = self.store.recoverable_jobs().await?;
        let count = rows.len();

        for row in rows {
            self.arm(row.into());
        }

        info!(count, "re-armed outstanding jobs");
        Ok(count)
    }
}
