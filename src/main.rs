//! Willow - Discord bot for Pokemon GO communities
//!
//! Keeps a per-server map of today's field research, lets members report
//! tasks conversationally, and matches trade offers between trainers.

mod common;
mod config;
mod discord;
mod matcher;
mod research;
mod session;
mod store;
mod trade;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use common::Catalog;
use config::{env::get_config_path, load_and_validate};
use discord::DiscordBotBuilder;
use matcher::EntityMatcher;
use session::{run_sweep, BotState};
use store::JsonStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Willow v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        error!("See willow.conf.example for reference.");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Data directory: {}", config.storage.data_dir.display());
    info!("  Sweep interval: {}s", config.research.sweep_interval_secs);

    // Load state
    let matcher = Arc::new(EntityMatcher::new(Arc::new(Catalog::bundled())));
    let store = Arc::new(JsonStore::new(config.storage.data_dir.clone()));
    let state = BotState::load(
        store,
        matcher,
        chrono::Duration::minutes(config.research.event_expiry_minutes),
    )?;
    let state = Arc::new(Mutex::new(state));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Periodic reset of stale stops
    let mut sweep_task = tokio::spawn(run_sweep(
        state.clone(),
        Duration::from_secs(config.research.sweep_interval_secs),
        shutdown_rx.clone(),
    ));

    info!("Starting Discord bot...");
    let discord_bot = DiscordBotBuilder::new(config.discord.clone(), state.clone(), shutdown_rx)
        .build()
        .await?;
    let mut discord_task = tokio::spawn(discord_bot.run());

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping...");
            true
        }
        _ = &mut discord_task => false,
        _ = &mut sweep_task => false,
    };

    if let Err(e) = shutdown_tx.send(true) {
        debug!("Shutdown channel closed (tasks already exited): {}", e);
    }

    if shutdown {
        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, discord_task).await {
            Ok(Ok(())) => info!("Discord disconnected gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
        if let Err(e) = tokio::time::timeout(timeout, sweep_task).await {
            warn!("Map sweep did not stop in time: {}", e);
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
