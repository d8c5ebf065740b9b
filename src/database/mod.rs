//! # Database Operations
//!
//! Connection management and schema ownership for the PostgreSQL store.
//!
//! ## Key Components
//!
//! - [`connection`] - Bounded pool construction with an eager connectivity check
//! - [`migrations`] - Embedded schema migrations
//! - [`store`] - Repository bundle handed to the rest of the engine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use workflow_engine::config::DatabaseConfig;
//! use workflow_engine::database::{DatabaseConnection, DatabaseMigrations, Store};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::connect(&DatabaseConfig::default()).await?;
//! DatabaseMigrations::run_all(db.pool()).await?;
//!
//! let store = Store::postgres(db.pool().clone());
//! let project = store.projects.find_by_id(uuid::Uuid::new_v4()).await?;
//! assert!(project.is_none());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
pub use store::Store;
