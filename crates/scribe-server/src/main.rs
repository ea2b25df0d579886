//! Scribe server
//!
//! Runs the collaboration server until Ctrl-C, then flushes every open
//! document to the store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scribe_core::{Config, DocumentStore, MemoryStore, PersistenceCoordinator, StoreGateway};
use scribe_server::Server;

#[derive(Parser)]
#[command(name = "scribe-server")]
#[command(about = "Scribe - real-time collaborative document server")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/scribe/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep documents in memory instead of the document store
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_logging(&config);

    if cli.memory_store {
        warn!("Using the in-memory store; documents are lost on exit");
        run(MemoryStore::new(), config).await
    } else {
        let store = StoreGateway::from_config(&config).context("Failed to set up store client")?;
        run(store, config).await
    }
}

async fn run<S: DocumentStore>(store: S, config: Config) -> Result<()> {
    let coordinator = PersistenceCoordinator::from_config(store, &config);
    let server = Server::new(coordinator.clone(), &config);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to listen on {}", addr))?;

    info!(
        "{} listening on ws://{} ({}, store {}, debounce {:?})",
        config.server_name,
        addr,
        config.environment,
        config.store_url,
        config.debounce_window()
    );

    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    coordinator.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Log to stderr, filtered by RUST_LOG or the configured level
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scribe_core={level},scribe_server={level}",
            level = config.log_level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
