mod bot;
mod commands;
mod config;
mod health;
mod lifecycle;
mod membership;
mod moderation;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::platform::evolution::EvolutionClient;
use crate::platform::webhook::{self, WebhookState};

/// Room for bursts of webhook deliveries while handlers are busy
const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wabot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Prefix: {}", config.bot.prefix);
    info!("  Owner: {}", config.bot.owner.as_deref().unwrap_or("(none)"));
    info!("  Gateway: {}", config.evolution.api_url);
    info!("  Instance: {}", config.evolution.instance_name);
    if config.evolution.api_key.is_empty() {
        warn!("No Evolution API key configured; gateway requests will likely be refused");
    }
    if config.evolution.webhook_token().is_empty() {
        warn!("No webhook token configured; every webhook delivery will be dropped");
    }

    // Liveness endpoint, independent of everything else
    let port = config.server.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            error!("Liveness endpoint stopped: {:#}", e);
        }
    });

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    // Gateway -> bot events
    let webhook_bind = config.evolution.webhook_bind.clone();
    let webhook_state = WebhookState::new(
        &config.evolution.instance_name,
        config.evolution.webhook_token(),
        events_tx.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = webhook::serve(&webhook_bind, webhook_state).await {
            error!("Webhook receiver stopped: {:#}", e);
        }
    });

    let client = Arc::new(EvolutionClient::new(config.evolution.clone()));

    // Pairing and ready events from bootstrap flow through the same channel
    let bootstrap_client = Arc::clone(&client);
    tokio::spawn(async move {
        if let Err(e) = bootstrap_client.bootstrap(&events_tx).await {
            error!("Gateway bootstrap failed: {:#}", e);
        }
    });

    let state = Arc::new(AppState::new(config, client));

    info!("Bot is starting...");
    bot::run(state, events_rx).await?;

    Ok(())
}
