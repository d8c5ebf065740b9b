//! # Event Bus
//!
//! Publish/subscribe transport for inbound workflow events, bound to PostgreSQL
//! LISTEN/NOTIFY. Delivery is fire-and-forget: no acknowledgement, no
//! redelivery, in publish order per channel and subscriber. Notifications sent
//! while a listener is reconnecting are lost.
//!
//! The [`EventSubscriber`] and [`EventPublisher`] traits are the seams the
//! orchestration loop and the publisher binary are written against.

pub mod listener;
pub mod payload;
pub mod publisher;

use async_trait::async_trait;
use thiserror::Error;

pub use listener::PgEventListener;
pub use payload::ProjectCreatedEvent;
pub use publisher::PgEventPublisher;

/// Event bus failures
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event bus database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payload of {size} bytes exceeds the {limit} byte notification limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("Event subscription closed")]
    Closed,
}

pub type EventResult<T> = std::result::Result<T, EventError>;

/// A raw payload received on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub channel: String,
    pub payload: String,
}

impl EventMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Receiving side of the bus
#[async_trait]
pub trait EventSubscriber: Send {
    /// Wait for the next payload; `Ok(None)` means the subscription has ended
    async fn recv(&mut self) -> EventResult<Option<EventMessage>>;
}

/// Sending side of the bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> EventResult<()>;
}
