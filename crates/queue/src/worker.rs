//! Bounded worker pool draining the due channel.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use db::{models::JobStatus, JobStore};

use crate::ScheduledJob;

/// Whatever re-invokes the owning action when its job comes due.
#[async_trait]
pub trait JobHandler: Send + Sync {
    type Error: Display + Send;

    async fn handle(&self, job: &ScheduledJob) -> Result<(), Self::Error>;
}

/// Consume due jobs until the channel closes, running at most
/// `max_concurrent` handlers at a time.
///
/// Handler errors are logged and recorded on the job; they never stop the
/// loop.
pub async fn run_worker<H>(
    mut due_rx: mpsc::Receiver<ScheduledJob>,
    store: Arc<dyn JobStore>,
    handler: Arc<H>,
    max_concurrent: usize,
) where
    H: JobHandler + 'static,
{
    let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
    info!(max_concurrent, "job worker started");

    while let Some(job) = due_rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let store = Arc::clone(&store);
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let _permit = permit;
            let status = match handler.handle(&job).await {
                Ok(()) => JobStatus::Completed,
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        instance_id = %job.instance_id,
                        action_id = %job.action_id,
                        error = %e,
                        "deferred job failed"
                    );
                    JobStatus::Failed
                }
            };

            if let Err(e) = store.set_job_status(job.id, status).await {
                warn!(job_id = %job.id, error = %e, "could not record job outcome");
            }
        });
    }

    info!("job worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use db::MemoryStore;

    use crate::{QueueConfig, TimerQueue};

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        type Error = String;

        async fn handle(&self, job: &ScheduledJob) -> Result<(), String> {
            self.seen.lock().unwrap().push(job.action_id.clone());
            if job.action_id == "broken" {
                return Err("domain work failed".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn outcomes_are_recorded_per_job() {
        let store = Arc::new(MemoryStore::new());
        let job_store: Arc<dyn JobStore> = store.clone();
        let (queue, rx) = TimerQueue::new(Arc::clone(&job_store), QueueConfig::default());
        let handler = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });

        let ok = queue.book(uuid::Uuid::new_v4(), "fine", Utc::now()).await.unwrap();
        let bad = queue.book(uuid::Uuid::new_v4(), "broken", Utc::now()).await.unwrap();
        queue.arm(ok.clone());
        queue.arm(bad.clone());
        // Closing the last sender ends the worker once both jobs drained.
        drop(queue);

        run_worker(rx, job_store, Arc::clone(&handler), 2).await;

        // Handlers run on spawned tasks; give them a moment to record.
        for _ in 0..50 {
            let done = store
                .jobs()
                .await
                .iter()
                .all(|j| matches!(j.job_status(), Some(JobStatus::Completed | JobStatus::Failed)));
            if done {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let jobs = store.jobs().await;
        let status_of = |id| jobs.iter().find(|j| j.id == id).and_then(|j| j.job_status());
        assert_eq!(status_of(ok.id), Some(JobStatus::Completed));
        assert_eq!(status_of(bad.id), Some(JobStatus::Failed));
        assert_eq!(handler.seen.lock().unwrap().len(), 2);
    }
}
