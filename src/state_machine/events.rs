use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that can trigger project state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProjectEvent {
    /// Begin working the project's stages
    Start,
    /// Mark the project as complete
    Complete,
    /// Mark the project as failed with a reason
    Fail(String),
}

impl ProjectEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that can trigger stage run state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StageRunEvent {
    /// Begin executing the stage
    Start,
    /// Stage finished, optionally with its output document
    Complete(Option<Value>),
    /// Stage failed with a reason
    Fail(String),
    /// Review gate accepted the run
    Approve,
    /// Review gate rejected the run
    Reject,
}

impl StageRunEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Output carried by a completion event
    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Complete(output) => output.as_ref(),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    pub fn complete_with_output(output: Value) -> Self {
        Self::Complete(Some(output))
    }
}
