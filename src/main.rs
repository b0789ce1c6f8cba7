//! Orb Rush Relay Server
//!
//! Runs one arena over WebSocket until Ctrl-C.

use std::sync::Arc;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orb_rush::{network::GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load().context("loading configuration")?;

    info!("Orb Rush Server v{}", VERSION);
    info!("Arena: {}px, {} players max", config.session.arena.arena_size, config.session.max_players);
    info!(
        "Round: {}s, orb policy {:?}, debuffs hit {:?}",
        config.session.arena.round_duration_secs,
        config.session.arena.object_policy,
        config.session.arena.debuff_target,
    );

    let server = Arc::new(GameServer::new(config));

    let ctrl_c_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            ctrl_c_server.shutdown();
        }
    });

    server.run().await.context("server failed")?;
    info!("Server stopped");
    Ok(())
}
