//! # Stage Run Model
//!
//! One execution attempt of a named workflow stage within a project.
//!
//! ## Database Schema
//!
//! Maps to the `stage_runs` table:
//! - `stage_run_id`: Primary key (UUID)
//! - `project_id`: References `projects.project_id` (the run does not own the project)
//! - `stage_name`: Free-form stage label
//! - `status`: `pending`, `running`, `completed`, `failed`, `approved` or `rejected`
//! - `input_context` / `output_context`: Opaque JSONB documents (nullable)
//! - `started_at` / `completed_at`: Caller-supplied timing (nullable TIMESTAMPTZ)
//! - `created_at` / `updated_at`: Database-clock timestamps
//!
//! Nothing at this layer prevents two active runs of the same stage for one
//! project; the state machine layer decides which edges are legal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::state_machine::StageRunState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    pub stage_run_id: Uuid,
    pub project_id: Uuid,
    pub stage_name: String,
    pub status: StageRunState,
    pub input_context: Option<Value>,
    pub output_context: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New StageRun for creation; always starts `pending` with no timing set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStageRun {
    pub project_id: Uuid,
    pub stage_name: String,
    pub input_context: Option<Value>,
}

/// Timing fields written alongside a status change.
///
/// PostgreSQL stores microseconds; values with finer precision are truncated on
/// write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRunTiming {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageRunTiming {
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(started_at),
            completed_at: None,
        }
    }

    pub fn finished(started_at: Option<DateTime<Utc>>, completed_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            completed_at: Some(completed_at),
        }
    }
}

/// Persistence contract for stage runs
#[async_trait]
pub trait StageRunRepository: Send + Sync {
    /// Insert a `pending` run with a fresh identifier
    async fn create(&self, new_stage_run: NewStageRun) -> StorageResult<StageRun>;

    /// `Ok(None)` when no row exists
    async fn find_by_id(&self, stage_run_id: Uuid) -> StorageResult<Option<StageRun>>;

    /// All runs of a project, oldest first
    async fn list_for_project(&self, project_id: Uuid) -> StorageResult<Vec<StageRun>>;

    /// Move the run from `from` to `to`, overwriting both timing fields and,
    /// when `output_context` is given, the output document, all in one write.
    ///
    /// The write only applies while the stored status is still `from`;
    /// otherwise it fails with [`StorageError::StatusConflict`]. A missing row
    /// is [`StorageError::RowMissing`].
    async fn update_status(
        &self,
        stage_run_id: Uuid,
        from: StageRunState,
        to: StageRunState,
        timing: StageRunTiming,
        output_context: Option<Value>,
    ) -> StorageResult<StageRun>;
}

#[derive(Debug, FromRow)]
struct StageRunRow {
    stage_run_id: Uuid,
    project_id: Uuid,
    stage_name: String,
    status: String,
    input_context: Option<Value>,
    output_context: Option<Value>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StageRunRow> for StageRun {
    type Error = StorageError;

    fn try_from(row: StageRunRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<StageRunState>()
            .map_err(|e| StorageError::decode("stage_run", e))?;

        Ok(StageRun {
            stage_run_id: row.stage_run_id,
            project_id: row.project_id,
            stage_name: row.stage_name,
            status,
            input_context: row.input_context,
            output_context: row.output_context,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const STAGE_RUN_COLUMNS: &str = "stage_run_id, project_id, stage_name, status, input_context, \
     output_context, started_at, completed_at, created_at, updated_at";

/// PostgreSQL-backed stage run repository
#[derive(Clone)]
pub struct PgStageRunRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgStageRunRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStageRunRepository")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PgStageRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn status_miss(&self, stage_run_id: Uuid, expected: StageRunState) -> StorageError {
        let actual = sqlx::query_scalar::<_, String>(
            "SELECT status FROM stage_runs WHERE stage_run_id = $1",
        )
        .bind(stage_run_id)
        .fetch_optional(&self.pool)
        .await;

        match actual {
            Ok(Some(actual)) => {
                StorageError::status_conflict("stage_run", stage_run_id, expected, actual)
            }
            Ok(None) => StorageError::RowMissing {
                entity: "stage_run",
                id: stage_run_id,
            },
            Err(e) => StorageError::database("update stage run status", e),
        }
    }
}

#[async_trait]
impl StageRunRepository for PgStageRunRepository {
    #[instrument(skip(self, new_stage_run), fields(project_id = %new_stage_run.project_id, stage = %new_stage_run.stage_name))]
    async fn create(&self, new_stage_run: NewStageRun) -> StorageResult<StageRun> {
        let row = sqlx::query_as::<_, StageRunRow>(&format!(
            r#"
            INSERT INTO stage_runs (
                stage_run_id, project_id, stage_name, status, input_context, output_context,
                started_at, completed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, NULL, NULL, clock_timestamp(), clock_timestamp())
            RETURNING {STAGE_RUN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_stage_run.project_id)
        .bind(&new_stage_run.stage_name)
        .bind(StageRunState::Pending.as_str())
        .bind(&new_stage_run.input_context)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::database("create stage run", e))?;

        StageRun::try_from(row)
    }

    async fn find_by_id(&self, stage_run_id: Uuid) -> StorageResult<Option<StageRun>> {
        let row = sqlx::query_as::<_, StageRunRow>(&format!(
            "SELECT {STAGE_RUN_COLUMNS} FROM stage_runs WHERE stage_run_id = $1"
        ))
        .bind(stage_run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("get stage run", e))?;

        row.map(StageRun::try_from).transpose()
    }

    async fn list_for_project(&self, project_id: Uuid) -> StorageResult<Vec<StageRun>> {
        let rows = sqlx::query_as::<_, StageRunRow>(&format!(
            "SELECT {STAGE_RUN_COLUMNS} FROM stage_runs WHERE project_id = $1 ORDER BY created_at ASC, stage_run_id ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::database("list stage runs", e))?;

        rows.into_iter().map(StageRun::try_from).collect()
    }

    #[instrument(skip(self, timing, output_context))]
    async fn update_status(
        &self,
        stage_run_id: Uuid,
        from: StageRunState,
        to: StageRunState,
        timing: StageRunTiming,
        output_context: Option<Value>,
    ) -> StorageResult<StageRun> {
        let row = sqlx::query_as::<_, StageRunRow>(&format!(
            r#"
            UPDATE stage_runs
            SET status = $3,
                started_at = $4,
                completed_at = $5,
                output_context = COALESCE($6, output_context),
                updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')
            WHERE stage_run_id = $1 AND status = $2
            RETURNING {STAGE_RUN_COLUMNS}
            "#
        ))
        .bind(stage_run_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(timing.started_at)
        .bind(timing.completed_at)
        .bind(&output_context)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("update stage run status", e))?;

        match row {
            Some(row) => StageRun::try_from(row),
            None => Err(self.status_miss(stage_run_id, from).await),
        }
    }
}
