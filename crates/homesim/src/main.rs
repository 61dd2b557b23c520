use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use homesim::Config;
use homesim::Engine;
use homesim::api;
use homesim::engine::FileStore;
use homesim::engine::MemoryStore;
use homesim::engine::Store;
use tracing_subscriber::prelude::*;

/// Smart-home light and sensor simulator
#[derive(Debug, Parser)]
#[command(name = "homesim", version)]
struct Cli {
    /// Path to the TOML config file (defaults to ./homesim.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("homesim starting");
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from: {}", path.display());
    }

    let store: Box<dyn Store> = if config.store.memory {
        tracing::info!("Keeping state in memory");
        Box::new(MemoryStore::new())
    } else {
        tracing::info!("Persisting state to {}", config.store.path.display());
        Box::new(FileStore::new(&config.store.path))
    };

    let engine = Engine::new(store, config.simulation.engine_settings());

    // The first tick runs before any request is served
    engine
        .tick()
        .await
        .context("Failed to persist initial state")?;
    let ticker = engine.spawn_ticker();
    tracing::info!(
        "Ticking every {:?}",
        engine.settings().tick_interval
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
            }
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        }
        shutdown_tx.send(()).ok();
    });

    let port = cli.port.unwrap_or(config.server.port);
    let result = api::serve(&config.server.listen, port, engine.clone(), shutdown_rx).await;

    ticker.abort();
    engine.shutdown().await;
    tracing::info!("homesim shutdown complete");

    result
}
