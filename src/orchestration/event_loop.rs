//! # Orchestration Loop
//!
//! Single sequential consumer of one subscription. Every payload is handed to
//! its own tracked task; the receive step only waits when all handler permits
//! are taken. Each task runs under a deadline. Handler failures are logged and
//! counted, never retried, and never stop the loop.
//!
//! ## Shutdown
//!
//! Cancelling the shutdown token stops receiving. In-flight handlers then get
//! the grace period to finish; whatever is still running afterwards is
//! cancelled at its next suspension point.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::handler::EventHandler;
use crate::config::OrchestrationConfig;
use crate::error::WorkflowError;
use crate::events::{EventMessage, EventSubscriber};

/// Pause after a failed receive before trying again
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Limits applied to dispatched handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_concurrent_handlers: usize,
    pub handler_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl From<&OrchestrationConfig> for LoopSettings {
    fn from(config: &OrchestrationConfig) -> Self {
        Self {
            max_concurrent_handlers: config.max_concurrent_handlers,
            handler_timeout: config.handler_timeout(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Counters for everything the loop has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub malformed: u64,
    pub timed_out: u64,
    /// Dropped while waiting for a permit at shutdown, or aborted after the grace period
    pub cancelled: u64,
    pub receive_errors: u64,
}

impl LoopStats {
    /// Handlers that have finished one way or another
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.malformed + self.timed_out + self.cancelled
    }
}

enum HandlerOutcome {
    Succeeded,
    Failed,
    Malformed,
    TimedOut,
    Cancelled,
}

pub struct OrchestrationLoop {
    handler: Arc<dyn EventHandler>,
    settings: LoopSettings,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    abort: CancellationToken,
    stats: Arc<RwLock<LoopStats>>,
}

impl std::fmt::Debug for OrchestrationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationLoop")
            .field("handler", &self.handler.name())
            .field("settings", &self.settings)
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

impl OrchestrationLoop {
    pub fn new(handler: Arc<dyn EventHandler>, settings: LoopSettings) -> Self {
        Self {
            handler,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_handlers)),
            settings,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
            stats: Arc::new(RwLock::new(LoopStats::default())),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.read().clone()
    }

    /// Handlers currently running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop receiving and begin draining
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Receive until shutdown or until the subscription ends, then drain
    pub async fn run<S: EventSubscriber>(&self, mut subscriber: S) -> LoopStats {
        info!(
            handler = self.handler.name(),
            max_concurrent_handlers = self.settings.max_concurrent_handlers,
            handler_timeout_ms = self.settings.handler_timeout.as_millis() as u64,
            "Orchestration loop started"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = subscriber.recv() => received,
            };

            match received {
                Ok(Some(message)) => {
                    self.stats.write().received += 1;
                    self.dispatch(message).await;
                }
                Ok(None) => {
                    info!("Event subscription ended");
                    break;
                }
                Err(e) => {
                    self.stats.write().receive_errors += 1;
                    warn!(error = %e, "Failed to receive event, retrying");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            }
        }

        self.drain().await;

        let stats = self.stats();
        info!(?stats, "Orchestration loop stopped");
        stats
    }

    async fn dispatch(&self, message: EventMessage) {
        let Some(permit) = self.acquire_permit().await else {
            self.stats.write().cancelled += 1;
            warn!(
                channel = %message.channel,
                "Shutdown while waiting for a handler slot, dropping event"
            );
            return;
        };

        self.stats.write().dispatched += 1;

        let handler = Arc::clone(&self.handler);
        let stats = Arc::clone(&self.stats);
        let abort = self.abort.clone();
        let deadline = self.settings.handler_timeout;

        self.tracker.spawn(async move {
            let outcome = Self::run_handler(handler, message, deadline, abort).await;
            drop(permit);

            let mut stats = stats.write();
            match outcome {
                HandlerOutcome::Succeeded => stats.succeeded += 1,
                HandlerOutcome::Failed => stats.failed += 1,
                HandlerOutcome::Malformed => stats.malformed += 1,
                HandlerOutcome::TimedOut => stats.timed_out += 1,
                HandlerOutcome::Cancelled => stats.cancelled += 1,
            }
        });
    }

    async fn acquire_permit(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }

    async fn run_handler(
        handler: Arc<dyn EventHandler>,
        message: EventMessage,
        deadline: Duration,
        abort: CancellationToken,
    ) -> HandlerOutcome {
        let result = tokio::select! {
            _ = abort.cancelled() => {
                warn!(handler = handler.name(), "Handler cancelled after shutdown grace period");
                return HandlerOutcome::Cancelled;
            }
            result = tokio::time::timeout(deadline, handler.handle(&message)) => result,
        };

        match result {
            Ok(Ok(())) => {
                debug!(handler = handler.name(), "Event handled");
                HandlerOutcome::Succeeded
            }
            Ok(Err(WorkflowError::MalformedEvent(reason))) => {
                warn!(
                    handler = handler.name(),
                    channel = %message.channel,
                    payload = %message.payload,
                    reason = %reason,
                    "Dropping malformed event"
                );
                HandlerOutcome::Malformed
            }
            Ok(Err(e)) => {
                error!(handler = handler.name(), error = %e, "Event handler failed");
                HandlerOutcome::Failed
            }
            Err(_) => {
                error!(
                    handler = handler.name(),
                    timeout_ms = deadline.as_millis() as u64,
                    "Event handler timed out"
                );
                HandlerOutcome::TimedOut
            }
        }
    }

    async fn drain(&self) {
        self.tracker.close();

        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight handlers");
        }

        if tokio::time::timeout(self.settings.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.tracker.len(),
                grace_ms = self.settings.shutdown_grace.as_millis() as u64,
                "Shutdown grace period elapsed, cancelling remaining handlers"
            );
            self.abort.cancel();
            self.tracker.wait().await;
        }
    }
}
