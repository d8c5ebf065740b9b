//! # Project Event Publisher
//!
//! Publishes project-created payloads on the event bus and exits. Stands in
//! for the upstream system that announces new projects.
//!
//! ```bash
//! cargo run --bin publish-project-event -- --name "Acme Launch" --description demo
//! cargo run --bin publish-project-event -- --count 20
//! ```

use anyhow::Context;
use clap::Parser;
use futures::{stream, TryStreamExt};
use tracing::info;
use uuid::Uuid;

use workflow_engine::config::ConfigManager;
use workflow_engine::database::DatabaseConnection;
use workflow_engine::events::{EventError, EventPublisher, PgEventPublisher, ProjectCreatedEvent};
use workflow_engine::logging;

#[derive(Debug, Parser)]
#[command(
    name = "publish-project-event",
    version,
    about = "Publish project-created events"
)]
struct Args {
    /// Project name; numbered when publishing more than one event
    #[arg(long, default_value = "Acme Launch")]
    name: String,

    #[arg(long, default_value = "demo")]
    description: Option<String>,

    /// Channel to publish on; defaults to EVENT_CHANNEL
    #[arg(long)]
    channel: Option<String>,

    /// Number of events to publish
    #[arg(long, default_value_t = 1)]
    count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = config_manager.config();
    logging::init_structured_logging(config_manager.environment(), &config.logging);

    let options = config
        .event_bus
        .connect_options(&config.database)
        .context("Invalid event bus configuration")?;
    let connection = DatabaseConnection::connect_event_bus(options, &config.database)
        .await
        .context("Failed to connect to the event bus")?;
    let publisher = PgEventPublisher::new(connection.pool().clone());

    let channel = args
        .channel
        .clone()
        .unwrap_or_else(|| config.event_bus.channel.clone());

    let events = (0..args.count)
        .map(|index| {
            let name = if args.count == 1 {
                args.name.clone()
            } else {
                format!("{} {}", args.name, index + 1)
            };
            let mut event = ProjectCreatedEvent::new(Uuid::new_v4().to_string(), name);
            event.description = args.description.clone();
            event
        })
        .collect::<Vec<_>>();

    let payloads = events
        .iter()
        .map(ProjectCreatedEvent::to_payload)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to serialize event")?;

    // Sequential, preserving publish order
    stream::iter(payloads.iter().map(Ok::<_, EventError>))
        .try_for_each(|payload| publisher.publish(&channel, payload))
        .await
        .context("Failed to publish event")?;

    for event in &events {
        info!(event_id = %event.id, name = %event.name, channel = %channel, "Published project created event");
    }

    connection.close().await;
    Ok(())
}
