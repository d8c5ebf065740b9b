// Test Helpers Module - in-memory doubles for unit tests
//
// Repositories keep the same observable contract as the PostgreSQL ones:
// repository-minted identifiers, microsecond timestamps, strictly increasing
// updated_at, source-event dedupe, RowMissing on absent updates and
// StatusConflict when a status write finds another status in place.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::database::Store;
use crate::error::{StorageError, StorageResult};
use crate::events::{EventMessage, EventPublisher, EventResult, EventSubscriber};
use crate::models::{
    NewPersona, NewProject, NewStageRun, Persona, PersonaRepository, Project, ProjectCreation,
    ProjectRepository, StageRun, StageRunRepository, StageRunTiming,
};
use crate::state_machine::{database_timestamp, ProjectState, StageRunState};

fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    database_timestamp().max(previous + chrono::Duration::microseconds(1))
}

fn simulated_failure(operation: &'static str) -> StorageError {
    StorageError::database(
        operation,
        sqlx::Error::Protocol("simulated storage failure".to_string()),
    )
}

#[derive(Debug, Default)]
pub struct InMemoryProjectRepository {
    projects: DashMap<Uuid, Project>,
    by_source_event: DashMap<String, Uuid>,
    failing_names: DashSet<String>,
    create_delay: Option<Duration>,
    read_delay: Option<Duration>,
    create_calls: AtomicUsize,
}

impl InMemoryProjectRepository {
    /// Every create sleeps first, simulating a slow store
    pub fn with_create_delay(delay: Duration) -> Self {
        Self {
            create_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every lookup by id sleeps first, widening the gap between a state
    /// machine's read and its write
    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Creates for this project name fail with a storage error
    pub fn fail_creates_named(&self, name: impl Into<String>) {
        self.failing_names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<Project> {
        self.projects.iter().map(|p| p.value().clone()).collect()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn create(&self, new_project: NewProject) -> StorageResult<ProjectCreation> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_names.contains(&new_project.name) {
            return Err(simulated_failure("create project"));
        }

        let now = database_timestamp();
        let project = Project {
            project_id: Uuid::new_v4(),
            name: new_project.name,
            description: new_project.description,
            status: ProjectState::Created,
            source_event_id: new_project.source_event_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let Some(source_event_id) = new_project.source_event_id else {
            self.projects.insert(project.project_id, project.clone());
            return Ok(ProjectCreation::Created(project));
        };

        match self.by_source_event.entry(source_event_id) {
            Entry::Occupied(existing) => {
                let existing = self
                    .projects
                    .get(existing.get())
                    .map(|p| p.value().clone())
                    .ok_or_else(|| StorageError::decode("project", "dangling source event"))?;
                Ok(ProjectCreation::Existing(existing))
            }
            Entry::Vacant(slot) => {
                self.projects.insert(project.project_id, project.clone());
                slot.insert(project.project_id);
                Ok(ProjectCreation::Created(project))
            }
        }
    }

    async fn find_by_id(&self, project_id: Uuid) -> StorageResult<Option<Project>> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.projects.get(&project_id).map(|p| p.value().clone()))
    }

    async fn find_by_source_event(&self, source_event_id: &str) -> StorageResult<Option<Project>> {
        let Some(project_id) = self.by_source_event.get(source_event_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.projects.get(&project_id).map(|p| p.value().clone()))
    }

    async fn update_status(
        &self,
        project_id: Uuid,
        from: ProjectState,
        to: ProjectState,
    ) -> StorageResult<Project> {
        let mut project = self
            .projects
            .get_mut(&project_id)
            .ok_or(StorageError::RowMissing {
                entity: "project",
                id: project_id,
            })?;

        if project.status != from {
            return Err(StorageError::status_conflict(
                "project",
                project_id,
                from,
                project.status,
            ));
        }

        project.status = to;
        project.updated_at = advance(project.updated_at);
        Ok(project.clone())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPersonaRepository {
    personas: DashMap<Uuid, Persona>,
}

#[async_trait]
impl PersonaRepository for InMemoryPersonaRepository {
    async fn create(&self, new_persona: NewPersona) -> StorageResult<Persona> {
        let now = database_timestamp();
        let persona = Persona {
            persona_id: Uuid::new_v4(),
            name: new_persona.name,
            description: new_persona.description,
            prompt_template: new_persona.prompt_template,
            model_config: new_persona.model_config,
            created_at: now,
            updated_at: now,
        };
        self.personas.insert(persona.persona_id, persona.clone());
        Ok(persona)
    }

    async fn find_by_id(&self, persona_id: Uuid) -> StorageResult<Option<Persona>> {
        Ok(self.personas.get(&persona_id).map(|p| p.value().clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStageRunRepository {
    stage_runs: DashMap<Uuid, StageRun>,
    read_delay: Option<Duration>,
    fail_status_updates: AtomicBool,
}

impl InMemoryStageRunRepository {
    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Status writes from now on fail with a storage error and change nothing
    pub fn fail_status_updates(&self) {
        self.fail_status_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StageRunRepository for InMemoryStageRunRepository {
    async fn create(&self, new_stage_run: NewStageRun) -> StorageResult<StageRun> {
        let now = database_timestamp();
        let stage_run = StageRun {
            stage_run_id: Uuid::new_v4(),
            project_id: new_stage_run.project_id,
            stage_name: new_stage_run.stage_name,
            status: StageRunState::Pending,
            input_context: new_stage_run.input_context,
            output_context: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.stage_runs.insert(stage_run.stage_run_id, stage_run.clone());
        Ok(stage_run)
    }

    async fn find_by_id(&self, stage_run_id: Uuid) -> StorageResult<Option<StageRun>> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.stage_runs.get(&stage_run_id).map(|r| r.value().clone()))
    }

    async fn list_for_project(&self, project_id: Uuid) -> StorageResult<Vec<StageRun>> {
        let mut runs: Vec<StageRun> = self
            .stage_runs
            .iter()
            .filter(|r| r.project_id == project_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.stage_run_id.cmp(&b.stage_run_id))
        });
        Ok(runs)
    }

    async fn update_status(
        &self,
        stage_run_id: Uuid,
        from: StageRunState,
        to: StageRunState,
        timing: StageRunTiming,
        output_context: Option<Value>,
    ) -> StorageResult<StageRun> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(simulated_failure("update stage run status"));
        }

        let mut run = self.stage_runs.get_mut(&stage_run_id).ok_or(StorageError::RowMissing {
            entity: "stage_run",
            id: stage_run_id,
        })?;

        if run.status != from {
            return Err(StorageError::status_conflict(
                "stage_run",
                stage_run_id,
                from,
                run.status,
            ));
        }

        run.status = to;
        run.started_at = timing.started_at;
        run.completed_at = timing.completed_at;
        if let Some(output_context) = output_context {
            run.output_context = Some(output_context);
        }
        run.updated_at = advance(run.updated_at);
        Ok(run.clone())
    }
}

/// Typed handles on the in-memory repositories behind a [`Store`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub projects: Arc<InMemoryProjectRepository>,
    pub personas: Arc<InMemoryPersonaRepository>,
    pub stage_runs: Arc<InMemoryStageRunRepository>,
}

impl InMemoryStore {
    pub fn store(&self) -> Store {
        Store::new(
            self.projects.clone(),
            self.personas.clone(),
            self.stage_runs.clone(),
        )
    }
}

/// Subscriber fed by an mpsc channel; the subscription ends when every
/// publisher is dropped
#[derive(Debug)]
pub struct ChannelSubscriber {
    receiver: mpsc::UnboundedReceiver<EventMessage>,
}

#[async_trait]
impl EventSubscriber for ChannelSubscriber {
    async fn recv(&mut self) -> EventResult<Option<EventMessage>> {
        Ok(self.receiver.recv().await)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<EventMessage>,
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> EventResult<()> {
        self.sender
            .send(EventMessage::new(channel, payload))
            .map_err(|_| crate::events::EventError::Closed)
    }
}

pub fn in_memory_bus() -> (ChannelPublisher, ChannelSubscriber) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelPublisher { sender }, ChannelSubscriber { receiver })
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_project_source_event_dedupe() {
        let repo = InMemoryProjectRepository::default();
        let first = repo
            .create(NewProject::new("Once").with_source_event("evt-1"))
            .await
            .unwrap();
        let second = repo
            .create(NewProject::new("Once again").with_source_event("evt-1"))
            .await
            .unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(first.project(), second.project());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_rows() {
        let repo = InMemoryStageRunRepository::default();
        let id = Uuid::new_v4();
        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            repo.update_status(
                id,
                StageRunState::Pending,
                StageRunState::Running,
                StageRunTiming::default(),
                None,
            )
            .await,
            Err(StorageError::RowMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_write_requires_expected_status() {
        let repo = InMemoryProjectRepository::default();
        let project = repo
            .create(NewProject::new("Guarded"))
            .await
            .unwrap()
            .into_project();

        let error = repo
            .update_status(project.project_id, ProjectState::Running, ProjectState::Completed)
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::StatusConflict { ref actual, .. } if actual == "created"));
        assert_eq!(
            repo.find_by_id(project.project_id).await.unwrap().unwrap().status,
            ProjectState::Created
        );
    }
}
