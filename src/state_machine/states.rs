use serde::{Deserialize, Serialize};
use std::fmt;

/// Project lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    /// Initial state when the project row is inserted
    #[default]
    Created,
    /// Stages are being worked
    Running,
    /// All work finished successfully
    Completed,
    /// Work stopped with an error
    Failed,
}

impl ProjectState {
    pub const ALL: [ProjectState; 4] = [
        Self::Created,
        Self::Running,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid project state: {s}")),
        }
    }
}

/// Stage run lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunState {
    /// Created, not yet picked up
    #[default]
    Pending,
    /// Stage work in progress
    Running,
    /// Stage work finished; may still go through review
    Completed,
    /// Stage work failed
    Failed,
    /// Output accepted at the review gate
    Approved,
    /// Output rejected at the review gate
    Rejected,
}

impl StageRunState {
    pub const ALL: [StageRunState; 6] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Approved,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// States that carry a `completed_at` timestamp
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Approved | Self::Rejected
        )
    }

    /// Whether the review gate may act on the run
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Running | Self::Completed)
    }
}

impl fmt::Display for StageRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageRunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid stage run state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_state_terminal_check() {
        assert!(ProjectState::Completed.is_terminal());
        assert!(ProjectState::Failed.is_terminal());
        assert!(!ProjectState::Created.is_terminal());
        assert!(!ProjectState::Running.is_terminal());
    }

    #[test]
    fn test_stage_run_state_groups() {
        assert!(StageRunState::Running.is_reviewable());
        assert!(StageRunState::Completed.is_reviewable());
        assert!(!StageRunState::Failed.is_reviewable());

        let terminal: Vec<_> = StageRunState::ALL
            .into_iter()
            .filter(StageRunState::is_terminal)
            .collect();
        assert_eq!(
            terminal,
            vec![
                StageRunState::Completed,
                StageRunState::Failed,
                StageRunState::Approved,
                StageRunState::Rejected
            ]
        );
    }

    #[test]
    fn test_state_string_conversion() {
        for state in ProjectState::ALL {
            assert_eq!(state.to_string().parse::<ProjectState>().unwrap(), state);
        }
        for state in StageRunState::ALL {
            assert_eq!(state.to_string().parse::<StageRunState>().unwrap(), state);
        }
        assert!("in_progress".parse::<ProjectState>().is_err());
        assert!("Pending".parse::<StageRunState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&StageRunState::Approved).unwrap();
        assert_eq!(json, "\"approved\"");

        let parsed: ProjectState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, ProjectState::Running);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ProjectState::default(), ProjectState::Created);
        assert_eq!(StageRunState::default(), StageRunState::Pending);
    }
}
