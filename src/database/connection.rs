use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::{info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::error::{Result, StorageError, StorageResult, WorkflowError};

/// Connections held by a pool dedicated to the event bus: one for LISTEN, one
/// for NOTIFY
const EVENT_BUS_POOL_SIZE: u32 = 2;

/// Bounded connection pool, verified at construction
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl DatabaseConnection {
    /// Open the store's pool and fail fast when the database is unreachable
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = config.connect_options()?;

        let pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime());

        let connection =
            Self::verified(pool_options, options, config.connect_timeout(), "database").await?;

        info!(
            "Database pool initialized: {}..{} connections, {}s acquire timeout",
            config.min_connections,
            config.max_connections,
            config.acquire_timeout_seconds
        );

        Ok(connection)
    }

    /// Open a small pool for an event bus living on a separate server
    #[instrument(skip(options, config))]
    pub async fn connect_event_bus(
        options: PgConnectOptions,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        let pool_options = PgPoolOptions::new()
            .max_connections(EVENT_BUS_POOL_SIZE)
            .acquire_timeout(config.acquire_timeout())
            .max_lifetime(config.max_lifetime());

        Self::verified(pool_options, options, config.connect_timeout(), "event_bus").await
    }

    /// Wrap an existing pool without verifying it
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn verified(
        pool_options: PgPoolOptions,
        options: PgConnectOptions,
        timeout: Duration,
        component: &'static str,
    ) -> Result<Self> {
        let pool = pool_options.connect_lazy_with(options);
        let connection = Self { pool };

        match tokio::time::timeout(timeout, connection.health_check()).await {
            Ok(Ok(true)) => Ok(connection),
            Ok(Ok(false)) => {
                connection.close().await;
                Err(WorkflowError::connectivity(
                    component,
                    "connectivity check returned an unexpected value",
                ))
            }
            Ok(Err(e)) => {
                connection.close().await;
                Err(WorkflowError::connectivity(component, e.to_string()))
            }
            Err(_) => {
                warn!(component, "Connectivity check timed out after {:?}", timeout);
                connection.close().await;
                Err(WorkflowError::connectivity(
                    component,
                    format!("no response within {}s", timeout.as_secs()),
                ))
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> StorageResult<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::database("health_check", e))?;

        let health: i32 = row
            .try_get("health")
            .map_err(|e| StorageError::database("health_check", e))?;
        Ok(health == 1)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
