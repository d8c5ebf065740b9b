use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::events::{EventMessage, ProjectCreatedEvent};
use crate::logging::log_project_operation;
use crate::models::{NewProject, ProjectCreation, ProjectRepository};

/// Turns one received payload into its side effect.
///
/// A payload that cannot be interpreted is reported as
/// [`WorkflowError::MalformedEvent`](crate::error::WorkflowError::MalformedEvent);
/// the loop counts it separately from handler failures.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &EventMessage) -> Result<()>;
}

/// Creates a project for each project-created event
#[derive(Clone)]
pub struct ProjectCreatedHandler {
    projects: Arc<dyn ProjectRepository>,
}

impl ProjectCreatedHandler {
    pub fn new(projects: Arc<dyn ProjectRepository>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl EventHandler for ProjectCreatedHandler {
    fn name(&self) -> &'static str {
        "project_created"
    }

    #[instrument(skip(self, message), fields(channel = %message.channel))]
    async fn handle(&self, message: &EventMessage) -> Result<()> {
        let event = ProjectCreatedEvent::parse(&message.payload)?;
        debug!(event_id = %event.id, name = %event.name, "Handling project created event");

        let mut new_project = NewProject::new(event.name).with_source_event(event.id);
        new_project.description = event.description;

        match self.projects.create(new_project).await? {
            ProjectCreation::Created(project) => log_project_operation(
                "create",
                Some(project.project_id),
                project.status.as_str(),
                None,
            ),
            ProjectCreation::Existing(project) => log_project_operation(
                "create",
                Some(project.project_id),
                project.status.as_str(),
                Some("event already applied"),
            ),
        }

        Ok(())
    }
}
