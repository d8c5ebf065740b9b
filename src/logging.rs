//! # Structured Logging Module
//!
//! Environment-aware structured logging. Console output is always enabled; when
//! a log directory is configured, a JSON file layer is added so handler
//! failures can be correlated after the fact.

use std::fs;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Subsequent calls are no-ops.
pub fn init_structured_logging(environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = config
            .filter
            .clone()
            .unwrap_or_else(|| default_log_level(environment).to_string());

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_filter(EnvFilter::new(&log_level));

        let mut guard = None;
        let file_layer = config.log_dir.as_ref().and_then(|log_dir| {
            if let Err(e) = fs::create_dir_all(log_dir) {
                eprintln!("Could not create log directory {}: {e}", log_dir.display());
                return None;
            }

            let pid = process::id();
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let file_appender = tracing_appender::rolling::never(
                log_dir,
                format!("{environment}.{pid}.{timestamp}.log"),
            );
            let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(file_guard);

            Some(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&log_level)),
            )
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            file_output = config.log_dir.is_some(),
            "Structured logging initialized"
        );

        // The file writer must outlive every span; it lives until process exit
        if let Some(guard) = guard {
            std::mem::forget(guard);
        }
    });
}

/// Default filter directive for an environment
pub fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for project operations
pub fn log_project_operation(
    operation: &str,
    project_id: Option<Uuid>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        project_id = ?project_id,
        status = %status,
        details = details,
        "PROJECT_OPERATION"
    );
}

/// Log structured data for stage run operations
pub fn log_stage_run_operation(
    operation: &str,
    project_id: Option<Uuid>,
    stage_run_id: Option<Uuid>,
    stage_name: Option<&str>,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        project_id = ?project_id,
        stage_run_id = ?stage_run_id,
        stage_name = stage_name,
        status = %status,
        "STAGE_RUN_OPERATION"
    );
}

/// Log structured data for event bus traffic
pub fn log_event_operation(
    operation: &str,
    channel: &str,
    payload_bytes: usize,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        channel = %channel,
        payload_bytes = payload_bytes,
        details = details,
        "EVENT_OPERATION"
    );
}
