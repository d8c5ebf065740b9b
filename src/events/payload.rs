//! Payload shapes carried on the event bus

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;

/// Announcement that a project should exist.
///
/// `id` is the publisher's identifier for the event, not the project's; it is
/// recorded as the project's source event so redelivery is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreatedEvent {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProjectCreatedEvent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse and validate a raw payload
    pub fn parse(payload: &str) -> Result<Self, WorkflowError> {
        let document: Value = serde_json::from_str(payload)
            .map_err(|e| WorkflowError::MalformedEvent(format!("invalid JSON payload: {e}")))?;

        // serde also accepts a struct as a positional array; only objects are events
        if !document.is_object() {
            return Err(WorkflowError::MalformedEvent(
                "payload must be a JSON object".to_string(),
            ));
        }

        let event: Self = serde_json::from_value(document)
            .map_err(|e| WorkflowError::MalformedEvent(format!("invalid event fields: {e}")))?;

        if event.id.trim().is_empty() {
            return Err(WorkflowError::MalformedEvent(
                "event id must not be empty".to_string(),
            ));
        }

        if event.name.trim().is_empty() {
            return Err(WorkflowError::MalformedEvent(
                "project name must not be empty".to_string(),
            ));
        }

        Ok(event)
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
