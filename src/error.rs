//! # Error Taxonomy
//!
//! Structured error types for the workflow engine. Startup failures
//! (`Configuration`, `Connectivity`) are fatal; everything that can happen
//! once the orchestration loop is serving is contained at the scope of a
//! single repository call or handler task and surfaced through logs.

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;

/// Top-level error for the engine
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Connectivity error: {component}: {message}")]
    Connectivity { component: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),
}

impl WorkflowError {
    pub fn connectivity(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error should terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Connectivity { .. })
    }
}

/// Failure of a single persistence operation
///
/// A lookup that finds nothing is not a `StorageError`; repositories return
/// `Ok(None)` for that case.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{entity} {id} does not exist")]
    RowMissing { entity: &'static str, id: Uuid },

    /// A conditional status write found the row in another status
    #[error("{entity} {id} is {actual}, expected {expected}")]
    StatusConflict {
        entity: &'static str,
        id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Could not decode {entity} row: {message}")]
    Decode {
        entity: &'static str,
        message: String,
    },
}

impl StorageError {
    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    pub fn decode(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            entity,
            message: message.into(),
        }
    }

    pub fn status_conflict(
        entity: &'static str,
        id: Uuid,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::StatusConflict {
            entity,
            id,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub type Result<T> = std::result::Result<T, WorkflowError>;
