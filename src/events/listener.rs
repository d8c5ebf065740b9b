//! Event subscriber using sqlx::PgListener

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::{EventMessage, EventResult, EventSubscriber};
use crate::config::validate_channel_name;
use crate::events::EventError;
use crate::logging::log_event_operation;

/// Subscription to one LISTEN channel.
///
/// The underlying `PgListener` holds a dedicated connection checked out of the
/// pool it was built from and reconnects on its own when that connection drops.
pub struct PgEventListener {
    listener: PgListener,
    channel: String,
}

impl std::fmt::Debug for PgEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventListener")
            .field("channel", &self.channel)
            .field("listener", &"PgListener")
            .finish()
    }
}

impl PgEventListener {
    /// Connect and start listening on `channel`
    #[instrument(skip(pool))]
    pub async fn connect(pool: &PgPool, channel: &str) -> EventResult<Self> {
        validate_channel_name(channel).map_err(|e| EventError::InvalidChannel(e.to_string()))?;

        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(channel).await?;

        info!(channel = %channel, "Listening for events");

        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl EventSubscriber for PgEventListener {
    async fn recv(&mut self) -> EventResult<Option<EventMessage>> {
        match self.listener.recv().await {
            Ok(notification) => {
                log_event_operation(
                    "received",
                    notification.channel(),
                    notification.payload().len(),
                    None,
                );

                Ok(Some(EventMessage::new(
                    notification.channel(),
                    notification.payload(),
                )))
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Event listener connection error");
                Err(EventError::Database(e))
            }
        }
    }
}
