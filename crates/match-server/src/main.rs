//! Fruit Match game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod protocol;
mod server;
mod session;

use config::ServerConfig;
use match_core::ProgressStore;
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

    let config = ServerConfig::from_env()?;

    info!("Starting Fruit Match server...");

    let progress = match &config.progress_path {
        Some(path) => {
            info!("Recording progress in {}", path.display());
            ProgressStore::open(path)
        }
        None => ProgressStore::in_memory(),
    };

    let state = Arc::new(ServerState::new(progress));

    server::run_server(config.addr, state).await
}
