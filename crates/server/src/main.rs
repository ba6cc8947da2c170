mod bootstrap;
mod health;
mod stdio;

use std::sync::Arc;

use anyhow::Result;
use quotebot_core::config::{AppConfig, LoadOptions};
use quotebot_plugin::PluginRunner;

use crate::health::HealthState;

/// Logs go to stderr; stdout carries the host protocol.
fn init_logging(config: &AppConfig) {
    use quotebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.db_pool.clone(), app.plugin.clone()),
    )
    .await?;

    let report = app.plugin.on_activate().await;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        trigger = %app.plugin.bot().trigger(),
        quotes_loaded = report.quotes_loaded.unwrap_or(0),
        channel_resolved = report.channel_resolved,
        user_resolved = report.user_resolved,
        "quotebot-server started"
    );

    let runner = PluginRunner::new(app.transport.clone(), Arc::clone(&app.plugin));
    tokio::select! {
        summary = runner.run() => {
            let summary = summary?;
            tracing::info!(
                event_name = "system.server.input_closed",
                correlation_id = "shutdown",
                envelopes = summary.envelopes,
                responded = summary.responded,
                failed = summary.failed,
                decode_errors = summary.decode_errors,
                "host input closed"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.interrupted",
                correlation_id = "shutdown",
                "shutdown signal received"
            );
        }
    }

    app.plugin.on_deactivate();
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "quotebot-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}
