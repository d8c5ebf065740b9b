use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::ProjectEvent,
    states::ProjectState,
};
use crate::logging::log_project_operation;
use crate::models::{Project, ProjectRepository};

/// Drives project status changes along the legal edges only
#[derive(Clone)]
pub struct ProjectStateMachine {
    projects: Arc<dyn ProjectRepository>,
}

impl ProjectStateMachine {
    pub fn new(projects: Arc<dyn ProjectRepository>) -> Self {
        Self { projects }
    }

    /// Resolve the target state for an event, or reject the edge.
    ///
    /// `created -> running -> completed`, with `failed` reachable from any
    /// non-terminal state.
    pub fn determine_target_state(
        current_state: ProjectState,
        event: &ProjectEvent,
    ) -> StateMachineResult<ProjectState> {
        let target = match (current_state, event) {
            (ProjectState::Created, ProjectEvent::Start) => ProjectState::Running,
            (ProjectState::Running, ProjectEvent::Complete) => ProjectState::Completed,
            (ProjectState::Created | ProjectState::Running, ProjectEvent::Fail(_)) => {
                ProjectState::Failed
            }
            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Current persisted state of a project
    pub async fn current_state(&self, project_id: Uuid) -> StateMachineResult<ProjectState> {
        Ok(self.load(project_id).await?.status)
    }

    /// Apply an event to a project and persist the resulting state
    #[instrument(skip(self, event), fields(event = event.event_type()))]
    pub async fn transition(
        &self,
        project_id: Uuid,
        event: ProjectEvent,
    ) -> StateMachineResult<Project> {
        let project = self.load(project_id).await?;
        let target_state = Self::determine_target_state(project.status, &event)?;

        debug!(
            from = %project.status,
            to = %target_state,
            "Transitioning project"
        );

        // Conditional on the status validated above, so a concurrent
        // transition cannot be overwritten
        let updated = self
            .projects
            .update_status(project_id, project.status, target_state)
            .await
            .map_err(|e| StateMachineError::from_status_write(e, event.event_type()))?;

        log_project_operation(
            event.event_type(),
            Some(project_id),
            target_state.as_str(),
            event.error_message(),
        );

        Ok(updated)
    }

    async fn load(&self, project_id: Uuid) -> StateMachineResult<Project> {
        self.projects
            .find_by_id(project_id)
            .await?
            .ok_or(StateMachineError::NotFound {
                entity: "project",
                id: project_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProject;
    use crate::test_helpers::InMemoryProjectRepository;
    use proptest::prelude::*;
    use std::time::Duration;

    fn machine() -> (ProjectStateMachine, Arc<InMemoryProjectRepository>) {
        let repo = Arc::new(InMemoryProjectRepository::default());
        (ProjectStateMachine::new(repo.clone()), repo)
    }

    #[test]
    fn test_legal_edges() {
        use ProjectState::*;
        assert_eq!(
            ProjectStateMachine::determine_target_state(Created, &ProjectEvent::Start).unwrap(),
            Running
        );
        assert_eq!(
            ProjectStateMachine::determine_target_state(Running, &ProjectEvent::Complete).unwrap(),
            Completed
        );
        assert_eq!(
            ProjectStateMachine::determine_target_state(Created, &ProjectEvent::fail_with_error("x"))
                .unwrap(),
            Failed
        );
        assert_eq!(
            ProjectStateMachine::determine_target_state(Running, &ProjectEvent::fail_with_error("x"))
                .unwrap(),
            Failed
        );
    }

    #[test]
    fn test_illegal_edges() {
        use ProjectState::*;
        assert!(ProjectStateMachine::determine_target_state(Created, &ProjectEvent::Complete).is_err());
        assert!(ProjectStateMachine::determine_target_state(Running, &ProjectEvent::Start).is_err());
        assert!(ProjectStateMachine::determine_target_state(Completed, &ProjectEvent::Start).is_err());
        assert!(
            ProjectStateMachine::determine_target_state(Failed, &ProjectEvent::fail_with_error("again"))
                .is_err()
        );
    }

    fn any_project_event() -> impl Strategy<Value = ProjectEvent> {
        prop_oneof![
            Just(ProjectEvent::Start),
            Just(ProjectEvent::Complete),
            ".*".prop_map(ProjectEvent::Fail),
        ]
    }

    proptest! {
        #[test]
        fn prop_terminal_states_accept_nothing(event in any_project_event()) {
            for state in ProjectState::ALL.into_iter().filter(ProjectState::is_terminal) {
                prop_assert!(ProjectStateMachine::determine_target_state(state, &event).is_err());
            }
        }

        #[test]
        fn prop_transitions_never_go_back_to_created(
            state in prop::sample::select(ProjectState::ALL.to_vec()),
            event in any_project_event(),
        ) {
            if let Ok(target) = ProjectStateMachine::determine_target_state(state, &event) {
                prop_assert_ne!(target, ProjectState::Created);
                prop_assert_ne!(target, state);
            }
        }
    }

    #[tokio::test]
    async fn test_transition_persists_full_lifecycle() {
        let (machine, repo) = machine();
        let project = repo
            .create(NewProject::new("Lifecycle"))
            .await
            .unwrap()
            .into_project();

        let running = machine.transition(project.project_id, ProjectEvent::Start).await.unwrap();
        assert_eq!(running.status, ProjectState::Running);
        assert!(running.updated_at > project.updated_at);

        let completed = machine
            .transition(project.project_id, ProjectEvent::Complete)
            .await
            .unwrap();
        assert_eq!(completed.status, ProjectState::Completed);
        assert_eq!(
            machine.current_state(project.project_id).await.unwrap(),
            ProjectState::Completed
        );
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_row_untouched() {
        let (machine, repo) = machine();
        let project = repo
            .create(NewProject::new("Untouched"))
            .await
            .unwrap()
            .into_project();

        let error = machine
            .transition(project.project_id, ProjectEvent::Complete)
            .await
            .unwrap_err();
        assert!(matches!(error, StateMachineError::InvalidTransition { .. }));

        let stored = repo.find_by_id(project.project_id).await.unwrap().unwrap();
        assert_eq!(stored, project);
    }

    #[tokio::test]
    async fn test_transition_on_missing_project() {
        let (machine, _) = machine();
        let error = machine
            .transition(Uuid::new_v4(), ProjectEvent::Start)
            .await
            .unwrap_err();
        assert!(matches!(error, StateMachineError::NotFound { entity: "project", .. }));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_cannot_both_apply() {
        let repo = Arc::new(InMemoryProjectRepository::with_read_delay(
            Duration::from_millis(30),
        ));
        let machine = ProjectStateMachine::new(repo.clone());
        let project_id = repo
            .create(NewProject::new("Contended"))
            .await
            .unwrap()
            .into_project()
            .project_id;
        machine.transition(project_id, ProjectEvent::Start).await.unwrap();

        // Both transitions read `running` before either writes
        let (failed, completed) = tokio::join!(
            machine.transition(project_id, ProjectEvent::fail_with_error("worker lost")),
            machine.transition(project_id, ProjectEvent::Complete),
        );

        let (winner, loser) = match (failed, completed) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            (failed, completed) => panic!("expected exactly one winner: {failed:?} / {completed:?}"),
        };

        assert!(winner.status.is_terminal());
        match loser {
            StateMachineError::InvalidTransition { from, .. } => {
                assert_eq!(from, winner.status.as_str());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(machine.current_state(project_id).await.unwrap(), winner.status);
    }
}
