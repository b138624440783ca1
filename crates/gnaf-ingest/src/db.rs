//! Phase-scoped database connections
//!
//! The pipeline never holds one session for its whole lifetime: each phase
//! acquires a pool here and closes it before the next phase starts, so no
//! idle connection sits open across a long bulk operation. The pipeline is
//! strictly sequential, so a single connection per pool is enough.

use gnaf_common::GnafError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Open a pool against the target database for one pipeline phase
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = pool_options(config)
        .connect(&config.url())
        .await
        .map_err(|e| GnafError::database(format!("{} ({})", e, config.database)))?;
    debug!(database = %config.database, "Connected to target database");
    Ok(pool)
}

/// Open a pool against the maintenance database
pub async fn connect_admin(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = pool_options(config)
        .connect(&config.admin_url())
        .await
        .map_err(|e| GnafError::database(format!("{} ({})", e, config.admin_database)))?;
    debug!(database = %config.admin_database, "Connected to admin database");
    Ok(pool)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
}

/// Create the target database
///
/// Fails if a database of that name already exists; every run targets a
/// fresh store and an existing one is an environment error.
pub async fn create_database(admin: &PgPool, name: &str) -> anyhow::Result<()> {
    // CREATE DATABASE takes no bind parameters; the name comes from config,
    // not from input files.
    sqlx::raw_sql(&format!("CREATE DATABASE {}", name))
        .execute(admin)
        .await?;

    info!(database = %name, "Created database");
    Ok(())
}

/// Verify the pool is usable
pub async fn health_check(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
