//! CLI argument parsing for syncapi

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use syncapi_rest::Network;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Read-only ledger query API
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "syncapi")]
#[command(about = "Read-only ledger query API")]
#[command(version)]
pub struct Cli {
    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Postgres connection URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum pooled connections
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Seconds a request waits for a free connection
    #[arg(long)]
    pub acquire_timeout_secs: Option<u64>,

    /// Network the database indexes (mainnet, preprod, preview)
    #[arg(long)]
    pub network: Option<Network>,

    /// Rows buffered ahead of a slow client when streaming
    #[arg(long)]
    pub stream_buffer: Option<usize>,

    /// Disable the permissive CORS layer
    #[arg(long)]
    pub no_cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
