//! syncapi server binary
//!
//! Serves the read-only ledger query API over a Postgres database.

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::{Cli, LogFormat};
use config::NodeConfig;
use syncapi_rest::{ApiContext, ApiServer};
use syncapi_store::{PgConnectionPool, StatementRegistry};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    init_tracing(&cli.log_level, cli.log_format);

    tracing::info!("syncapi starting...");

    let config = NodeConfig::resolve(&cli)?;

    // A malformed statement is fatal before anything is served
    let registry = StatementRegistry::compile().context("failed to compile statements")?;
    tracing::info!(statements = registry.len(), network = %config.network, "statements compiled");

    let pool = PgConnectionPool::connect(&config.pool_config())
        .await
        .context("failed to connect to database")?;

    let ctx = ApiContext::new(pool.clone(), registry, config.network)
        .with_stream_buffer(config.stream_buffer);
    let server = ApiServer::new(config.server_config(), ctx);

    server.run(shutdown_signal()).await?;

    pool.close().await;
    tracing::info!("syncapi stopped");

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over `--log-level`
fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
