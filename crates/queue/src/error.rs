//! Queue error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Too many timers are armed; the job was not booked.
    #[error("timer queue is full ({0} jobs pending)")]
    Full(usize),

    #[error("job store error: {0}")]
    Store(#[from] db::DbError),
}
