//! Event publisher using PostgreSQL NOTIFY

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

use super::{EventError, EventPublisher, EventResult};
use crate::config::validate_channel_name;
use crate::constants::MAX_NOTIFY_PAYLOAD_BYTES;
use crate::logging::log_event_operation;

/// Database-backed publisher; payloads go through `pg_notify` as bind
/// parameters
#[derive(Clone)]
pub struct PgEventPublisher {
    pool: PgPool,
}

impl std::fmt::Debug for PgEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventPublisher")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PgEventPublisher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reject payloads and channels NOTIFY would refuse
    pub fn validate(channel: &str, payload: &str) -> EventResult<()> {
        validate_channel_name(channel).map_err(|e| EventError::InvalidChannel(e.to_string()))?;

        if payload.len() > MAX_NOTIFY_PAYLOAD_BYTES {
            return Err(EventError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_NOTIFY_PAYLOAD_BYTES,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for PgEventPublisher {
    #[instrument(skip(self, payload), fields(channel = %channel))]
    async fn publish(&self, channel: &str, payload: &str) -> EventResult<()> {
        Self::validate(channel, payload)?;

        debug!("Sending notification to channel: {}", channel);

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to send notification to channel {}: {}", channel, e);
                EventError::Database(e)
            })?;

        log_event_operation("published", channel, payload.len(), None);
        Ok(())
    }
}
