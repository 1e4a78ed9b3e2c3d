use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use poolheatd::Config;
use poolheatd::Engine;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Pool heater daemon for Hayward OmniLogic controllers
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "poolheatd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets())
        .init();

    tracing::info!("poolheatd starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let engine = Arc::new(Engine::new());
    engine.register_integrations_from_config(&config);

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let api = config.api.clone().map(|api_config| {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let engine = engine.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) =
                poolheatd::api::serve(api_config.listen, api_config.port, engine, shutdown_rx).await
            {
                tracing::error!("HTTP API server failed: {:#}", e);
            }
        });
        (shutdown_tx, handle)
    });

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some((shutdown_tx, handle)) = api {
        shutdown_tx.send(()).ok();
        handle.await.ok();
    }

    tracing::info!("Shutting down integrations...");
    engine.shutdown().await;
    runner.abort();

    tracing::info!("poolheatd shutdown complete");

    Ok(())
}
