//! Configuration Loader
//!
//! Resolves [`EngineConfig`] from flat environment variables (`DB_HOST`,
//! `EVENT_CHANNEL`, ...). A `.env` file in the working directory is loaded first
//! when present; variables already set in the process win over the file.
//! A variable set to the empty string counts as unset and takes its default.
//!
//! Loading happens before logging is initialised, so nothing here logs; the
//! caller reports the outcome through [`ConfigManager::debug_config`].

use super::error::{ConfigResult, ConfigurationError};
use super::{DatabaseConfig, EngineConfig, EventBusConfig, LoggingConfig, OrchestrationConfig};
use crate::constants::defaults;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded, validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
}

/// Flat view of the environment; keys are the lowercased variable names
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default = "default_environment")]
    app_env: String,
    database_url: Option<String>,
    #[serde(default = "default_db_host")]
    db_host: String,
    #[serde(default = "default_db_port")]
    db_port: u16,
    #[serde(default = "default_db_user")]
    db_user: String,
    #[serde(default = "default_db_password")]
    db_password: String,
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default = "default_db_sslmode")]
    db_sslmode: String,
    #[serde(default = "default_db_max_connections")]
    db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    db_min_connections: u32,
    #[serde(default = "default_db_idle_timeout_seconds")]
    db_idle_timeout_seconds: u64,
    #[serde(default = "default_db_max_lifetime_seconds")]
    db_max_lifetime_seconds: u64,
    #[serde(default = "default_db_acquire_timeout_seconds")]
    db_acquire_timeout_seconds: u64,
    #[serde(default = "default_true")]
    db_run_migrations: bool,
    #[serde(default = "default_connect_timeout_seconds")]
    connect_timeout_seconds: u64,
    event_bus_url: Option<String>,
    #[serde(default = "default_event_channel")]
    event_channel: String,
    #[serde(default = "default_max_concurrent_handlers")]
    max_concurrent_handlers: usize,
    #[serde(default = "default_handler_timeout_seconds")]
    handler_timeout_seconds: u64,
    #[serde(default = "default_shutdown_grace_seconds")]
    shutdown_grace_seconds: u64,
    log_dir: Option<PathBuf>,
    rust_log: Option<String>,
}

fn default_environment() -> String {
    defaults::ENVIRONMENT.to_string()
}
fn default_db_host() -> String {
    defaults::DB_HOST.to_string()
}
fn default_db_port() -> u16 {
    defaults::DB_PORT
}
fn default_db_user() -> String {
    defaults::DB_USER.to_string()
}
fn default_db_password() -> String {
    defaults::DB_PASSWORD.to_string()
}
fn default_db_name() -> String {
    defaults::DB_NAME.to_string()
}
fn default_db_sslmode() -> String {
    defaults::DB_SSLMODE.to_string()
}
fn default_db_max_connections() -> u32 {
    defaults::DB_MAX_CONNECTIONS
}
fn default_db_min_connections() -> u32 {
    defaults::DB_MIN_CONNECTIONS
}
fn default_db_idle_timeout_seconds() -> u64 {
    defaults::DB_IDLE_TIMEOUT_SECONDS
}
fn default_db_max_lifetime_seconds() -> u64 {
    defaults::DB_MAX_LIFETIME_SECONDS
}
fn default_db_acquire_timeout_seconds() -> u64 {
    defaults::DB_ACQUIRE_TIMEOUT_SECONDS
}
fn default_true() -> bool {
    true
}
fn default_connect_timeout_seconds() -> u64 {
    defaults::CONNECT_TIMEOUT_SECONDS
}
fn default_event_channel() -> String {
    defaults::EVENT_CHANNEL.to_string()
}
fn default_max_concurrent_handlers() -> usize {
    defaults::MAX_CONCURRENT_HANDLERS
}
fn default_handler_timeout_seconds() -> u64 {
    defaults::HANDLER_TIMEOUT_SECONDS
}
fn default_shutdown_grace_seconds() -> u64 {
    defaults::SHUTDOWN_GRACE_SECONDS
}

impl From<EnvSettings> for EngineConfig {
    fn from(settings: EnvSettings) -> Self {
        Self {
            environment: settings.app_env,
            database: DatabaseConfig {
                url: settings.database_url,
                host: settings.db_host,
                port: settings.db_port,
                username: settings.db_user,
                password: settings.db_password,
                database: settings.db_name,
                sslmode: settings.db_sslmode,
                max_connections: settings.db_max_connections,
                min_connections: settings.db_min_connections,
                idle_timeout_seconds: settings.db_idle_timeout_seconds,
                max_lifetime_seconds: settings.db_max_lifetime_seconds,
                acquire_timeout_seconds: settings.db_acquire_timeout_seconds,
                connect_timeout_seconds: settings.connect_timeout_seconds,
                run_migrations: settings.db_run_migrations,
            },
            event_bus: EventBusConfig {
                url: settings.event_bus_url,
                channel: settings.event_channel,
            },
            orchestration: OrchestrationConfig {
                max_concurrent_handlers: settings.max_concurrent_handlers,
                handler_timeout_seconds: settings.handler_timeout_seconds,
                shutdown_grace_seconds: settings.shutdown_grace_seconds,
            },
            logging: LoggingConfig {
                log_dir: settings.log_dir,
                filter: settings.rust_log,
            },
        }
    }
}

impl ConfigManager {
    /// Load configuration from `.env` (if present) and the process environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        // A missing .env is the normal case outside development
        let _ = dotenvy::dotenv();
        Self::from_source(None)
    }

    /// Load configuration after applying a specific dotenv file
    pub fn load_with_env_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        dotenvy::from_path(path).map_err(|e| ConfigurationError::EnvFileError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_source(None)
    }

    /// Load configuration from an explicit variable map instead of the process
    /// environment. Keys use the same names as the environment variables.
    pub fn load_from_vars(vars: HashMap<String, String>) -> ConfigResult<Arc<ConfigManager>> {
        Self::from_source(Some(vars))
    }

    fn from_source(vars: Option<HashMap<String, String>>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = config::Environment::default()
            .ignore_empty(true)
            .source(vars.map(|vars| {
                vars.into_iter()
                    .map(|(key, value)| (key.to_uppercase(), value))
                    .collect()
            }));

        let settings: EnvSettings = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        let config = EngineConfig::from(settings);
        config.validate()?;

        Ok(Arc::new(ConfigManager { config }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the detected environment name
    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// Configuration with secrets masked, for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn sanitize_config_for_logging(config: &EngineConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential", "url"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        if !val.is_null() {
                            *val = serde_json::Value::String("[MASKED]".to_string());
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
