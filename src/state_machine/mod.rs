//! # Lifecycle State Machines
//!
//! Storage accepts any status value, so transition legality lives here. Callers
//! change project and stage run status through these machines rather than
//! through the repositories directly.
//!
//! Transitions are read-then-write without a row lock; concurrent writers to the
//! same row must serialize themselves.

pub mod errors;
pub mod events;
pub mod project_state_machine;
pub mod stage_run_state_machine;
pub mod states;

use chrono::{DateTime, SubsecRound, Utc};

pub use errors::{StateMachineError, StateMachineResult};
pub use events::{ProjectEvent, StageRunEvent};
pub use project_state_machine::ProjectStateMachine;
pub use stage_run_state_machine::StageRunStateMachine;
pub use states::{ProjectState, StageRunState};

/// Current UTC time at the precision PostgreSQL stores (microseconds), so a
/// value written and read back compares equal
pub fn database_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
