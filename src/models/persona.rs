//! # Persona Model
//!
//! Reusable prompt and model settings referenced by stage execution. The
//! `model_config` document is stored as JSONB and returned verbatim; its shape
//! belongs to whoever executes stages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Persona {
    pub persona_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prompt_template: String,
    pub model_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Persona for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPersona {
    pub name: String,
    pub description: Option<String>,
    pub prompt_template: String,
    pub model_config: Value,
}

/// Persistence contract for personas. Personas are immutable once created.
#[async_trait]
pub trait PersonaRepository: Send + Sync {
    async fn create(&self, new_persona: NewPersona) -> StorageResult<Persona>;

    /// `Ok(None)` when no row exists
    async fn find_by_id(&self, persona_id: Uuid) -> StorageResult<Option<Persona>>;
}

/// PostgreSQL-backed persona repository
#[derive(Clone)]
pub struct PgPersonaRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgPersonaRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPersonaRepository")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PgPersonaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonaRepository for PgPersonaRepository {
    #[instrument(skip(self, new_persona), fields(name = %new_persona.name))]
    async fn create(&self, new_persona: NewPersona) -> StorageResult<Persona> {
        sqlx::query_as::<_, Persona>(
            r#"
            INSERT INTO personas (persona_id, name, description, prompt_template, model_config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, clock_timestamp(), clock_timestamp())
            RETURNING persona_id, name, description, prompt_template, model_config, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_persona.name)
        .bind(&new_persona.description)
        .bind(&new_persona.prompt_template)
        .bind(&new_persona.model_config)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::database("create persona", e))
    }

    async fn find_by_id(&self, persona_id: Uuid) -> StorageResult<Option<Persona>> {
        sqlx::query_as::<_, Persona>(
            r#"
            SELECT persona_id, name, description, prompt_template, model_config, created_at, updated_at
            FROM personas
            WHERE persona_id = $1
            "#,
        )
        .bind(persona_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("get persona", e))
    }
}
