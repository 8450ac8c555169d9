//! Connection leasing
//!
//! A [`Lease`] is a scoped hold on one pooled connection. Dropping it returns
//! the connection to the pool, so every exit path releases it exactly once:
//! early `?` returns, panics, and cancelled futures included.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{trace, warn};

use crate::error::StoreResult;
use crate::query::BoundQuery;
use crate::Row;

/// A single database connection able to run bound statements
#[async_trait]
pub trait Connection: Send + 'static {
    /// Run a statement and materialize every row
    async fn fetch_all(&mut self, query: &BoundQuery) -> StoreResult<Vec<Row>>;

    /// Run a statement and yield rows as the backend produces them
    fn fetch<'c>(&'c mut self, query: &'c BoundQuery) -> BoxStream<'c, StoreResult<Row>>;
}

/// Source of connections
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    /// Connection type handed out by the pool
    type Connection: Connection;

    /// Wait for a free connection, bounded by the pool's acquire timeout
    async fn acquire(&self) -> StoreResult<Self::Connection>;
}

/// Scoped hold on one connection
pub struct Lease<C: Connection> {
    conn: C,
    id: u64,
    acquired_at: Instant,
}

impl<C: Connection> Lease<C> {
    fn new(id: u64, conn: C) -> Self {
        trace!(lease = id, "lease acquired");
        Self {
            conn,
            id,
            acquired_at: Instant::now(),
        }
    }

    /// Lease identifier, unique per manager
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Release the connection now
    ///
    /// Consumes the lease, so a second release does not type-check.
    pub fn release(self) {
        drop(self);
    }
}

impl<C: Connection> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Connection> Drop for Lease<C> {
    fn drop(&mut self) {
        trace!(
            lease = self.id,
            held_us = self.acquired_at.elapsed().as_micros() as u64,
            "lease released"
        );
    }
}

/// Hands out leases from a pool
pub struct LeaseManager<P: ConnectionPool> {
    pool: P,
    next_id: AtomicU64,
}

impl<P: ConnectionPool> LeaseManager<P> {
    /// Create a manager over `pool`
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            next_id: AtomicU64::new(1),
        }
    }

    /// Acquire a lease, suspending until a connection is free
    pub async fn acquire(&self) -> StoreResult<Lease<P::Connection>> {
        let conn = self.pool.acquire().await.map_err(|e| {
            warn!(error = %e, "connection acquisition failed");
            e
        })?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Lease::new(id, conn))
    }
}
