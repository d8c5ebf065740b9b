//! # Schema Migrations
//!
//! The schema lives in `migrations/` as timestamped SQL files
//! (`YYYYMMDDHHMMSS_description.sql`) embedded at compile time. sqlx records
//! applied versions in `_sqlx_migrations` and takes an advisory lock while
//! migrating, so concurrent starters apply each file once.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::{StorageError, StorageResult};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> StorageResult<()> {
        info!(
            available = MIGRATOR.iter().count(),
            "Applying database migrations"
        );

        MIGRATOR
            .run(pool)
            .await
            .map_err(|e| StorageError::database("migrate", sqlx::Error::Migrate(Box::new(e))))?;

        info!("Database schema is up to date");
        Ok(())
    }
}
