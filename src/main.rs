mod config;
mod server;
mod telegram;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::server::AppState;
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from the environment
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Telegram API base: {}", config.telegram_api_base);
    info!("  Configured bots: {:?}", config.credentials.bot_names());
    if config.credentials.is_empty() {
        warn!("No BOT_TOKEN_* variables set; every /send request will fail");
    }

    let listen_addr = config.listen_addr;
    let state = AppState::new(
        config.credentials,
        TelegramClient::new(config.telegram_api_base),
        &config.allowed_origin,
    )?;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {listen_addr}"))?;

    info!("Relay listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    Ok(())
}
