use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    database_timestamp,
    errors::{StateMachineError, StateMachineResult},
    events::StageRunEvent,
    states::StageRunState,
};
use crate::logging::log_stage_run_operation;
use crate::models::{NewStageRun, ProjectRepository, StageRun, StageRunRepository, StageRunTiming};

/// Creates stage runs and drives them along the legal edges, maintaining the
/// timing fields as it goes
#[derive(Clone)]
pub struct StageRunStateMachine {
    stage_runs: Arc<dyn StageRunRepository>,
    projects: Arc<dyn ProjectRepository>,
}

impl StageRunStateMachine {
    pub fn new(
        stage_runs: Arc<dyn StageRunRepository>,
        projects: Arc<dyn ProjectRepository>,
    ) -> Self {
        Self {
            stage_runs,
            projects,
        }
    }

    /// Resolve the target state for an event, or reject the edge.
    ///
    /// `pending -> running -> {completed, failed}`; the review gate moves
    /// `running` or `completed` runs to `approved` or `rejected`.
    pub fn determine_target_state(
        current_state: StageRunState,
        event: &StageRunEvent,
    ) -> StateMachineResult<StageRunState> {
        let target = match (current_state, event) {
            (StageRunState::Pending, StageRunEvent::Start) => StageRunState::Running,
            (StageRunState::Running, StageRunEvent::Complete(_)) => StageRunState::Completed,
            (StageRunState::Running, StageRunEvent::Fail(_)) => StageRunState::Failed,
            (from, StageRunEvent::Approve) if from.is_reviewable() => StageRunState::Approved,
            (from, StageRunEvent::Reject) if from.is_reviewable() => StageRunState::Rejected,
            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Timing fields to persist for a transition out of `stage_run`.
    ///
    /// Starting stamps `started_at`; reaching a terminal state stamps
    /// `completed_at` unless the run already finished, so review keeps the
    /// original completion time.
    fn timing_for(stage_run: &StageRun, target_state: StageRunState) -> StageRunTiming {
        let now = database_timestamp();

        if target_state == StageRunState::Running {
            StageRunTiming::started(now)
        } else if target_state.is_terminal() {
            StageRunTiming::finished(stage_run.started_at, stage_run.completed_at.unwrap_or(now))
        } else {
            StageRunTiming {
                started_at: stage_run.started_at,
                completed_at: stage_run.completed_at,
            }
        }
    }

    /// Create a `pending` run for an existing project
    #[instrument(skip(self, input_context))]
    pub async fn begin(
        &self,
        project_id: Uuid,
        stage_name: &str,
        input_context: Option<Value>,
    ) -> StateMachineResult<StageRun> {
        if self.projects.find_by_id(project_id).await?.is_none() {
            return Err(StateMachineError::NotFound {
                entity: "project",
                id: project_id,
            });
        }

        let stage_run = self
            .stage_runs
            .create(NewStageRun {
                project_id,
                stage_name: stage_name.to_string(),
                input_context,
            })
            .await?;

        log_stage_run_operation(
            "begin",
            Some(project_id),
            Some(stage_run.stage_run_id),
            Some(stage_name),
            stage_run.status.as_str(),
        );

        Ok(stage_run)
    }

    /// Current persisted state of a run
    pub async fn current_state(&self, stage_run_id: Uuid) -> StateMachineResult<StageRunState> {
        Ok(self.load(stage_run_id).await?.status)
    }

    /// Apply an event to a run and persist the resulting state and timing
    #[instrument(skip(self, event), fields(event = event.event_type()))]
    pub async fn transition(
        &self,
        stage_run_id: Uuid,
        event: StageRunEvent,
    ) -> StateMachineResult<StageRun> {
        let stage_run = self.load(stage_run_id).await?;
        let target_state = Self::determine_target_state(stage_run.status, &event)?;
        let timing = Self::timing_for(&stage_run, target_state);

        debug!(
            from = %stage_run.status,
            to = %target_state,
            stage = %stage_run.stage_name,
            "Transitioning stage run"
        );

        let updated = self
            .stage_runs
            .update_status(
                stage_run_id,
                stage_run.status,
                target_state,
                timing,
                event.output().cloned(),
            )
            .await
            .map_err(|e| StateMachineError::from_status_write(e, event.event_type()))?;

        log_stage_run_operation(
            "transition",
            Some(updated.project_id),
            Some(stage_run_id),
            Some(&updated.stage_name),
            target_state.as_str(),
        );

        Ok(updated)
    }

    async fn load(&self, stage_run_id: Uuid) -> StateMachineResult<StageRun> {
        self.stage_runs
            .find_by_id(stage_run_id)
            .await?
            .ok_or(StateMachineError::NotFound {
                entity: "stage_run",
                id: stage_run_id,
            })
    }
}
