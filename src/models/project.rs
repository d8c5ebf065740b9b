//! # Project Model
//!
//! Top-level unit of work tracked through the project lifecycle.
//!
//! ## Database Schema
//!
//! Maps to the `projects` table:
//! - `project_id`: Primary key (UUID), minted by the repository
//! - `name`: Required display name
//! - `description`: Optional free text
//! - `status`: One of `created`, `running`, `completed`, `failed` (TEXT)
//! - `source_event_id`: Identifier of the event that created the project (unique, nullable)
//! - `created_at` / `updated_at`: Database-clock timestamps (TIMESTAMPTZ)
//!
//! Projects are never deleted by the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::state_machine::ProjectState;

/// A project row with its lifecycle status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectState,
    pub source_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Project for creation (without generated fields)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    /// Set when the project originates from a bus event; redelivery of the same
    /// event resolves to the project it already created
    pub source_event_id: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source_event(mut self, source_event_id: impl Into<String>) -> Self {
        self.source_event_id = Some(source_event_id.into());
        self
    }
}

/// Result of a create call
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectCreation {
    /// A new row was inserted
    Created(Project),
    /// A project for the same source event already existed
    Existing(Project),
}

impl ProjectCreation {
    pub fn project(&self) -> &Project {
        match self {
            Self::Created(project) | Self::Existing(project) => project,
        }
    }

    pub fn into_project(self) -> Project {
        match self {
            Self::Created(project) | Self::Existing(project) => project,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persistence contract for projects
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a project in `created` status with a fresh identifier
    async fn create(&self, new_project: NewProject) -> StorageResult<ProjectCreation>;

    /// Look up a project; `Ok(None)` when no row exists
    async fn find_by_id(&self, project_id: Uuid) -> StorageResult<Option<Project>>;

    /// Look up the project created from a given bus event
    async fn find_by_source_event(&self, source_event_id: &str) -> StorageResult<Option<Project>>;

    /// Move the project from `from` to `to` and advance `updated_at`.
    ///
    /// The write only applies while the stored status is still `from`;
    /// otherwise it fails with [`StorageError::StatusConflict`]. A missing row
    /// is [`StorageError::RowMissing`].
    async fn update_status(
        &self,
        project_id: Uuid,
        from: ProjectState,
        to: ProjectState,
    ) -> StorageResult<Project>;
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    project_id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    source_event_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StorageError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ProjectState>()
            .map_err(|e| StorageError::decode("project", e))?;

        Ok(Project {
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            status,
            source_event_id: row.source_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PROJECT_COLUMNS: &str =
    "project_id, name, description, status, source_event_id, created_at, updated_at";

/// PostgreSQL-backed project repository
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgProjectRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgProjectRepository")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a conditional status write matched no row
    async fn status_miss(&self, project_id: Uuid, expected: ProjectState) -> StorageError {
        let actual = sqlx::query_scalar::<_, String>(
            "SELECT status FROM projects WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await;

        match actual {
            Ok(Some(actual)) => StorageError::status_conflict("project", project_id, expected, actual),
            Ok(None) => StorageError::RowMissing {
                entity: "project",
                id: project_id,
            },
            Err(e) => StorageError::database("update project status", e),
        }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    #[instrument(skip(self, new_project), fields(name = %new_project.name))]
    async fn create(&self, new_project: NewProject) -> StorageResult<ProjectCreation> {
        let project_id = Uuid::new_v4();

        let inserted = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (project_id, name, description, status, source_event_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, clock_timestamp(), clock_timestamp())
            ON CONFLICT (source_event_id) DO NOTHING
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(&new_project.name)
        .bind(&new_project.description)
        .bind(ProjectState::Created.as_str())
        .bind(&new_project.source_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("create project", e))?;

        if let Some(row) = inserted {
            return Ok(ProjectCreation::Created(Project::try_from(row)?));
        }

        // Only a source_event_id conflict suppresses the insert
        let source_event_id = new_project.source_event_id.as_deref().unwrap_or_default();
        debug!(source_event_id, "Project already exists for source event");

        self.find_by_source_event(source_event_id)
            .await?
            .map(ProjectCreation::Existing)
            .ok_or_else(|| {
                StorageError::decode("project", "conflicting source event row is not visible")
            })
    }

    async fn find_by_id(&self, project_id: Uuid) -> StorageResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = $1"
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("get project", e))?;

        row.map(Project::try_from).transpose()
    }

    async fn find_by_source_event(&self, source_event_id: &str) -> StorageResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE source_event_id = $1"
        ))
        .bind(source_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("get project by source event", e))?;

        row.map(Project::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        project_id: Uuid,
        from: ProjectState,
        to: ProjectState,
    ) -> StorageResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE projects
            SET status = $3,
                updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')
            WHERE project_id = $1 AND status = $2
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("update project status", e))?;

        match row {
            Some(row) => Project::try_from(row),
            None => Err(self.status_miss(project_id, from).await),
        }
    }
}
