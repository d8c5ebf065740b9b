//! # System Context
//!
//! Everything the orchestration components share, built once at startup and
//! passed down explicitly: configuration, the repository store and the
//! connections backing them.

use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::database::{DatabaseConnection, DatabaseMigrations, Store};
use crate::error::Result;

#[derive(Clone)]
pub struct SystemContext {
    config: Arc<EngineConfig>,
    store: Store,
    database: Option<DatabaseConnection>,
    event_bus: Option<DatabaseConnection>,
}

impl std::fmt::Debug for SystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("environment", &self.config.environment)
            .field("database", &self.database)
            .field("event_bus", &self.event_bus)
            .finish_non_exhaustive()
    }
}

impl SystemContext {
    /// Connect to the store (and the event bus when it lives elsewhere), apply
    /// migrations if enabled, and build the PostgreSQL repositories
    pub async fn connect(config: Arc<EngineConfig>) -> Result<Self> {
        let database = DatabaseConnection::connect(&config.database).await?;
        Self::over_database(config, database).await
    }

    /// Finish startup on an open store pool. The pool is closed if any later
    /// step fails.
    pub async fn over_database(
        config: Arc<EngineConfig>,
        database: DatabaseConnection,
    ) -> Result<Self> {
        match Self::open_event_bus(&config, &database).await {
            Ok(event_bus) => Ok(Self {
                store: Store::postgres(database.pool().clone()),
                config,
                database: Some(database),
                event_bus: Some(event_bus),
            }),
            Err(error) => {
                database.close().await;
                Err(error)
            }
        }
    }

    async fn open_event_bus(
        config: &EngineConfig,
        database: &DatabaseConnection,
    ) -> Result<DatabaseConnection> {
        if config.database.run_migrations {
            DatabaseMigrations::run_all(database.pool()).await?;
        }

        match config.event_bus.url {
            Some(_) => {
                let options = config.event_bus.connect_options(&config.database)?;
                info!("Event bus uses a dedicated server");
                DatabaseConnection::connect_event_bus(options, &config.database).await
            }
            None => Ok(database.clone()),
        }
    }

    /// Context over an already-built store, with no connections of its own
    pub fn with_store(config: Arc<EngineConfig>, store: Store) -> Self {
        Self {
            config,
            store,
            database: None,
            event_bus: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn database(&self) -> Option<&DatabaseConnection> {
        self.database.as_ref()
    }

    pub fn event_bus(&self) -> Option<&DatabaseConnection> {
        self.event_bus.as_ref()
    }

    /// Close every pool this context opened
    pub async fn close(&self) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.close().await;
        }
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}
