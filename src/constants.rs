//! # System Constants
//!
//! Channel names, limits and configuration fallbacks shared across the engine.

/// Channel carrying project-created payloads
pub const PROJECT_CREATED_CHANNEL: &str = "project_created_events";

/// PostgreSQL rejects NOTIFY payloads of 8000 bytes or more; keep a margin
pub const MAX_NOTIFY_PAYLOAD_BYTES: usize = 7800;

/// PostgreSQL identifier length limit (NAMEDATALEN - 1)
pub const MAX_CHANNEL_NAME_LENGTH: usize = 63;

/// Fallback values used when a variable is not present in the environment
pub mod defaults {
    pub const ENVIRONMENT: &str = "development";

    pub const DB_HOST: &str = "localhost";
    pub const DB_PORT: u16 = 5433;
    pub const DB_USER: &str = "user";
    pub const DB_PASSWORD: &str = "password";
    pub const DB_NAME: &str = "workflow_engine_db";
    pub const DB_SSLMODE: &str = "disable";

    pub const DB_MAX_CONNECTIONS: u32 = 25;
    pub const DB_MIN_CONNECTIONS: u32 = 10;
    pub const DB_IDLE_TIMEOUT_SECONDS: u64 = 300;
    pub const DB_MAX_LIFETIME_SECONDS: u64 = 300;
    pub const DB_ACQUIRE_TIMEOUT_SECONDS: u64 = 5;

    pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;

    pub const EVENT_CHANNEL: &str = super::PROJECT_CREATED_CHANNEL;

    pub const MAX_CONCURRENT_HANDLERS: usize = 32;
    pub const HANDLER_TIMEOUT_SECONDS: u64 = 30;
    pub const SHUTDOWN_GRACE_SECONDS: u64 = 10;
}
