//! Schema for the register's storage file.
//!
//! The SQL lives in `migrations/` and is compiled into the binary, so a
//! register never needs the files at runtime. Each script runs once per
//! storage file; sqlx records it in `_sqlx_migrations`.
//!
//! Scripts are append-only. Changing the `local_storage` table means a new
//! numbered script, never an edit to `001_local_storage.sql`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Bringing storage schema up to date");
    MIGRATOR.run(pool).await?;
    info!("Storage schema current");
    Ok(())
}

/// `(embedded, applied)` script counts. A file that was never migrated
/// reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
