//! # Orchestration
//!
//! Turns inbound bus events into state changes.
//!
//! ## Core Components
//!
//! - **SystemContext**: configuration, store and connections, built once and passed down
//! - **EventHandler**: one payload in, one side effect out (`ProjectCreatedHandler`)
//! - **OrchestrationLoop**: semaphore-gated dispatch with per-handler deadlines and a drain barrier
//! - **OrchestrationBootstrap**: connects everything and returns a stoppable handle
//!
//! Delivery is at most once. A failed or malformed event is logged and dropped;
//! nothing is retried.

pub mod bootstrap;
pub mod context;
pub mod event_loop;
pub mod handler;

pub use bootstrap::{OrchestrationBootstrap, OrchestrationHandle};
pub use context::SystemContext;
pub use event_loop::{LoopSettings, LoopStats, OrchestrationLoop};
pub use handler::{EventHandler, ProjectCreatedHandler};
