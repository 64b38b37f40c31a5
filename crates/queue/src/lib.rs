//! `queue` crate: durable deferred jobs.
//!
//! A job is *booked* (its record persisted), then *armed* (a tokio timer is
//! started).  When the timer goes off the job is sent down the due channel,
//! where [`run_worker`] hands it to a [`JobHandler`] on a bounded pool of
//! tasks.  Records outlive the process: [`TimerQueue::recover`] re-arms
//! everything still outstanding after a restart.

pub mod error;
pub mod job;
pub mod timer;
pub mod worker;

pub use error::QueueError;
pub use job::ScheduledJob;
pub use timer::{QueueConfig, TimerQueue};
pub use worker::{run_worker, JobHandler};
