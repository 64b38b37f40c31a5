//! Typed error type for the db crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// No `entity` row with the given id.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub(crate) fn instance_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "workflow instance", id }
    }

    pub(crate) fn job_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "scheduled job", id }
    }
}
