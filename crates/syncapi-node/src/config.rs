//! Configuration types for syncapi

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use syncapi_rest::{Network, ServerConfig, DEFAULT_STREAM_BUFFER};
use syncapi_store::PgPoolConfig;

use crate::cli::Cli;

/// Service configuration
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen address
    pub listen_addr: SocketAddr,
    /// Postgres connection URL
    pub database_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Seconds a request waits for a free connection
    pub acquire_timeout_secs: u64,
    /// Network the database indexes
    pub network: Network,
    /// Rows buffered ahead of a slow client when streaming
    pub stream_buffer: usize,
    /// Permissive CORS layer
    pub enable_cors: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        let pool = PgPoolConfig::default();
        Self {
            listen_addr: server.listen_addr,
            database_url: pool.url,
            max_connections: pool.max_connections,
            acquire_timeout_secs: pool.acquire_timeout.as_secs(),
            network: Network::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            enable_cors: server.enable_cors,
        }
    }
}

impl NodeConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Config file (if any) overlaid with explicitly given CLI flags
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(addr) = cli.listen_addr {
            self.listen_addr = addr;
        }
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(max) = cli.max_connections {
            self.max_connections = max;
        }
        if let Some(secs) = cli.acquire_timeout_secs {
            self.acquire_timeout_secs = secs;
        }
        if let Some(network) = cli.network {
            self.network = network;
        }
        if let Some(rows) = cli.stream_buffer {
            self.stream_buffer = rows;
        }
        if cli.no_cors {
            self.enable_cors = false;
        }
    }

    /// HTTP server settings
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.listen_addr,
            enable_cors: self.enable_cors,
        }
    }

    /// Connection pool settings
    pub fn pool_config(&self) -> PgPoolConfig {
        PgPoolConfig {
            url: self.database_url.clone(),
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            ..Default::default()
        }
    }
}
