//! Shared request context

use syncapi_store::{ConnectionPool, LeaseManager, StatementRegistry};

use crate::network::Network;

/// Rows buffered between the producer and the response body by default
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// State shared by every handler
pub struct ApiContext<P: ConnectionPool> {
    leases: LeaseManager<P>,
    registry: StatementRegistry,
    network: Network,
    stream_buffer: usize,
}

impl<P: ConnectionPool> ApiContext<P> {
    /// Create a context over `pool`
    pub fn new(pool: P, registry: StatementRegistry, network: Network) -> Self {
        Self {
            leases: LeaseManager::new(pool),
            registry,
            network,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Set the streaming channel capacity
    pub fn with_stream_buffer(mut self, rows: usize) -> Self {
        self.stream_buffer = rows.max(1);
        self
    }

    /// Lease manager
    pub fn leases(&self) -> &LeaseManager<P> {
        &self.leases
    }

    /// Compiled statements
    pub fn registry(&self) -> &StatementRegistry {
        &self.registry
    }

    /// Configured network
    pub fn network(&self) -> Network {
        self.network
    }

    /// Streaming channel capacity in rows
    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }
}
