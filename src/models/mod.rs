//! # Data Models
//!
//! Entity types for the three persisted tables together with their repository
//! contracts and PostgreSQL implementations.
//!
//! - [`project`] - Projects and their lifecycle status
//! - [`persona`] - Immutable prompt/model configurations
//! - [`stage_run`] - Per-stage execution records
//!
//! Every read and write goes to the database; nothing is cached in memory.

pub mod persona;
pub mod project;
pub mod stage_run;

pub use persona::{NewPersona, PgPersonaRepository, Persona, PersonaRepository};
pub use project::{NewProject, PgProjectRepository, Project, ProjectCreation, ProjectRepository};
pub use stage_run::{
    NewStageRun, PgStageRunRepository, StageRun, StageRunRepository, StageRunTiming,
};
