//! Hexsettle multiplayer game server.

use anyhow::Context;
use hexsettle_core::GameConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod protocol;
mod room;
mod server;

use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse address from env or use default
    let addr: SocketAddr = std::env::var("SERVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()?;

    // Optional default rules for rooms whose host sends none
    let state = match std::env::var("GAME_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading game config {path}"))?;
            let config = GameConfig::from_json(&json)?;
            info!(%path, "loaded default game config");
            ServerState::with_default_config(config)
        }
        Err(_) => ServerState::new(),
    };

    info!("Starting Hexsettle server...");

    let state = Arc::new(state);

    server::run_server(addr, state).await
}
