use thiserror::Error;
use uuid::Uuid;

use crate::error::StorageError;

/// Errors raised while driving lifecycle transitions
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Persistence failed: {0}")]
    Storage(#[from] StorageError),
}

impl StateMachineError {
    pub fn invalid_transition(from: impl ToString, event: &'static str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            event: event.to_string(),
        }
    }

    /// Classify a failed status write. Losing to a concurrent transition means
    /// the edge is judged against the status that won.
    pub fn from_status_write(error: StorageError, event: &'static str) -> Self {
        match error {
            StorageError::StatusConflict { actual, .. } => Self::InvalidTransition {
                from: actual,
                event: event.to_string(),
            },
            other => Self::Storage(other),
        }
    }
}


pub type StateMachineResult<T> = std::result::Result<T, StateMachineError>;
