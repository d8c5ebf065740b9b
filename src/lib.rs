#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Workflow Engine
//!
//! Control plane for a multi-stage asynchronous workflow engine. It reacts to
//! "project created" events, persists project and per-stage execution state in
//! PostgreSQL, and moves stage runs through their lifecycle from pending to
//! completed, approved or rejected.
//!
//! ## Architecture
//!
//! ```text
//! publisher -> event bus (LISTEN/NOTIFY) -> orchestration loop -> handler task
//!           -> repositories -> PostgreSQL
//! ```
//!
//! Storage accepts any status value; the state machines decide which edges are
//! legal. Everything a component needs arrives through an explicit
//! [`orchestration::SystemContext`] built once at startup.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven configuration with validation
//! - [`constants`] - Channel names, defaults and limits
//! - [`database`] - Connection pool, migrations and the repository [`database::Store`]
//! - [`error`] - Structured error handling
//! - [`events`] - Event bus traits and the PostgreSQL binding
//! - [`logging`] - Structured logging setup and operation records
//! - [`models`] - Project, Persona and StageRun with their repositories
//! - [`orchestration`] - Event loop, handlers and bootstrap
//! - [`state_machine`] - Project and stage run lifecycles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workflow_engine::config::ConfigManager;
//! use workflow_engine::orchestration::OrchestrationBootstrap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config_manager = ConfigManager::load()?;
//! let handle = OrchestrationBootstrap::bootstrap(Arc::new(config_manager.config().clone())).await?;
//!
//! // ... until a termination signal arrives
//! let stats = handle.stop().await;
//! println!("handled {} events", stats.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                          # Unit tests with in-memory doubles
//! DATABASE_URL=postgres://... cargo test -- --ignored   # PostgreSQL integration tests
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{ConfigManager, EngineConfig};
pub use database::{DatabaseConnection, Store};
pub use error::{Result, StorageError, WorkflowError};
pub use models::{Persona, Project, StageRun};
pub use orchestration::{OrchestrationBootstrap, OrchestrationHandle, SystemContext};
pub use state_machine::{ProjectState, ProjectStateMachine, StageRunState, StageRunStateMachine};
