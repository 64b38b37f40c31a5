//! Postgres connection pool and schema migrations.

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Shared Postgres pool used by [`crate::PgStore`].
pub type DbPool = PgPool;

/// Schema for instances, scheduled jobs and reports, embedded at build time.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Connect to `database_url` with at most `max_connections` connections.
///
/// Acquiring a connection gives up after five seconds.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    info!(max_connections, "database pool ready");
    Ok(pool)
}

/// Apply any pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!(known = MIGRATOR.iter().count(), "applying database migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}
