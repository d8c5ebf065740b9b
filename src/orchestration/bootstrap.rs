//! # Orchestration Bootstrap
//!
//! Wires a [`SystemContext`] to a subscription and starts the loop in the
//! background. The returned [`OrchestrationHandle`] is the only way to stop it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::context::SystemContext;
use super::event_loop::{LoopSettings, LoopStats, OrchestrationLoop};
use super::handler::ProjectCreatedHandler;
use crate::config::EngineConfig;
use crate::error::{Result, WorkflowError};
use crate::events::{EventSubscriber, PgEventListener};

/// Handle on a running orchestration loop
#[derive(Debug)]
pub struct OrchestrationHandle {
    context: SystemContext,
    orchestration_loop: Arc<OrchestrationLoop>,
    task: JoinHandle<LoopStats>,
}

impl OrchestrationHandle {
    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    pub fn stats(&self) -> LoopStats {
        self.orchestration_loop.stats()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop receiving, drain in-flight handlers, close the context's pools
    pub async fn stop(self) -> LoopStats {
        info!("Orchestration shutdown requested");
        self.orchestration_loop.shutdown();

        let stats = match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Orchestration loop task did not finish cleanly");
                self.orchestration_loop.stats()
            }
        };

        self.context.close().await;
        info!("Orchestration stopped");
        stats
    }
}

pub struct OrchestrationBootstrap;

impl OrchestrationBootstrap {
    /// Connect everything named in `config` and start listening.
    ///
    /// Configuration and connectivity failures here are fatal to the caller.
    pub async fn bootstrap(config: Arc<EngineConfig>) -> Result<OrchestrationHandle> {
        info!(environment = %config.environment, "Bootstrapping orchestration");

        let context = SystemContext::connect(config).await?;

        let bus = context
            .event_bus()
            .ok_or_else(|| WorkflowError::connectivity("event_bus", "no event bus connection"))?;
        let channel = context.config().event_bus.channel.clone();
        let listener = match PgEventListener::connect(bus.pool(), &channel).await {
            Ok(listener) => listener,
            Err(e) => {
                context.close().await;
                return Err(WorkflowError::connectivity("event_bus", e.to_string()));
            }
        };

        Ok(Self::start(context, listener))
    }

    /// Start the project-created loop over an existing context and subscription
    pub fn start<S>(context: SystemContext, subscriber: S) -> OrchestrationHandle
    where
        S: EventSubscriber + 'static,
    {
        let handler = Arc::new(ProjectCreatedHandler::new(context.store().projects.clone()));
        let settings = LoopSettings::from(&context.config().orchestration);
        let orchestration_loop = Arc::new(OrchestrationLoop::new(handler, settings));

        let task = tokio::spawn({
            let orchestration_loop = Arc::clone(&orchestration_loop);
            async move { orchestration_loop.run(subscriber).await }
        });

        info!(
            channel = %context.config().event_bus.channel,
            "Orchestration loop running"
        );

        OrchestrationHandle {
            context,
            orchestration_loop,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPublisher;
    use crate::test_helpers::{in_memory_bus, wait_until, InMemoryStore};
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_and_stop_with_in_memory_store() {
        let memory = InMemoryStore::default();
        let context = SystemContext::with_store(Arc::new(EngineConfig::default()), memory.store());
        let (publisher, subscriber) = in_memory_bus();

        let handle = OrchestrationBootstrap::start(context, subscriber);
        assert!(handle.is_running());
        assert!(handle.context().database().is_none());
        assert!(handle.context().event_bus().is_none());

        publisher
            .publish(
                "project_created_events",
                r#"{"id":"evt-acme","name":"Acme Launch","description":"demo"}"#,
            )
            .await
            .unwrap();

        let projects = memory.projects.clone();
        assert!(wait_until(Duration::from_secs(2), || projects.len() == 1).await);

        let stats = handle.stop().await;
        assert_eq!(stats.received, 1);
        assert_eq!(stats.succeeded, 1);
        assert!(memory.projects.all()[0].name.contains("Acme Launch"));
    }
}
