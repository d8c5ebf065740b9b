use std::sync::Arc;

use sqlx::PgPool;

use crate::models::{
    PersonaRepository, PgPersonaRepository, PgProjectRepository, PgStageRunRepository,
    ProjectRepository, StageRunRepository,
};
use crate::state_machine::{ProjectStateMachine, StageRunStateMachine};

/// The three repositories, behind their traits
#[derive(Clone)]
pub struct Store {
    pub projects: Arc<dyn ProjectRepository>,
    pub personas: Arc<dyn PersonaRepository>,
    pub stage_runs: Arc<dyn StageRunRepository>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        personas: Arc<dyn PersonaRepository>,
        stage_runs: Arc<dyn StageRunRepository>,
    ) -> Self {
        Self {
            projects,
            personas,
            stage_runs,
        }
    }

    /// PostgreSQL repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgProjectRepository::new(pool.clone())),
            Arc::new(PgPersonaRepository::new(pool.clone())),
            Arc::new(PgStageRunRepository::new(pool)),
        )
    }

    pub fn project_state_machine(&self) -> ProjectStateMachine {
        ProjectStateMachine::new(self.projects.clone())
    }

    pub fn stage_run_state_machine(&self) -> StageRunStateMachine {
        StageRunStateMachine::new(self.stage_runs.clone(), self.projects.clone())
    }
}
