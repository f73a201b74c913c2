//! PostgreSQL access: pool, bootstrap, repositories

pub mod init;
pub mod permissions;
pub mod repository;
pub mod schema_sync;
pub mod sessions;
pub mod users;

pub use init::*;
pub use permissions::Permissions;
pub use repository::*;
pub use schema_sync::SchemaSync;

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{info, warn};

/// Open the connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(Some(config.idle_timeout()))
        .connect_with(options)
        .await?;

    info!(
        "Connected to PostgreSQL (max {} connections, idle timeout {}s)",
        config.max_connections, config.idle_timeout_secs
    );
    Ok(pool)
}

/// Commit on success, roll back on failure
///
/// The original error is returned after a rollback; a failed rollback is
/// only logged (the connection is discarded when the transaction drops).
pub async fn finish<T>(tx: Transaction<'_, Postgres>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!("Rolling back transaction: {}", err);
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
