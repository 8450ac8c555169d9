//! Postgres backend on `sqlx`
//!
//! Every compiled statement selects `row_to_json(rows)`, so each row arrives
//! as one `json` value and is passed through without interpretation.
//!
//! A connection dropped while a statement is still in flight is detached
//! from the pool and closed instead of being returned. Returning it would
//! make `sqlx` drain the remaining result set before the slot frees up;
//! closing the socket makes the server abort the query.

use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, Postgres};
use sqlx::query::QueryScalar;
use sqlx::types::Json;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::lease::{Connection, ConnectionPool};
use crate::query::{BoundQuery, SqlValue};
use crate::Row;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PgPoolConfig {
    /// Connection URL
    pub url: String,
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Time a request waits for a free connection
    pub acquire_timeout: Duration,
    /// Idle connections are closed after this long
    pub idle_timeout: Option<Duration>,
}

impl Default for PgPoolConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/cexplorer".to_string(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl PgPoolConfig {
    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

/// Shared Postgres pool
#[derive(Clone)]
pub struct PgConnectionPool {
    pool: PgPool,
}

impl PgConnectionPool {
    /// Connect and verify the database is reachable
    pub async fn connect(config: &PgPoolConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&config.url)?;
        let pool = config.options().connect_with(connect_options).await?;
        info!(
            max_connections = config.max_connections,
            acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
            "postgres pool connected"
        );
        Ok(Self { pool })
    }

    /// Build the pool without opening a connection
    pub fn connect_lazy(config: &PgPoolConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&config.url)?;
        Ok(Self {
            pool: config.options().connect_lazy_with(connect_options),
        })
    }

    /// Close every connection and reject further acquisitions
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Underlying `sqlx` pool
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionPool for PgConnectionPool {
    type Connection = PooledPgConnection;

    async fn acquire(&self) -> StoreResult<PooledPgConnection> {
        Ok(PooledPgConnection::new(self.pool.acquire().await?))
    }
}

/// Connection checked out of [`PgConnectionPool`]
pub struct PooledPgConnection {
    /// `None` only once detached during drop
    conn: Option<PoolConnection<Postgres>>,
    /// A statement was started and its results not fully read
    in_flight: bool,
}

impl PooledPgConnection {
    fn new(conn: PoolConnection<Postgres>) -> Self {
        Self {
            conn: Some(conn),
            in_flight: false,
        }
    }

    /// Whether a statement's results are still pending on the socket
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

impl Drop for PooledPgConnection {
    fn drop(&mut self) {
        if !self.in_flight {
            return;
        }
        if let Some(conn) = self.conn.take() {
            debug!("closing connection with an unfinished statement");
            drop(conn.detach());
        }
    }
}

/// Rows of one statement; clears the in-flight flag once the backend reports
/// the end of the result set
struct Cursor<'c, S> {
    rows: S,
    in_flight: &'c mut bool,
}

impl<'c, S> Cursor<'c, S> {
    fn new(rows: S, in_flight: &'c mut bool) -> Self {
        *in_flight = true;
        Self { rows, in_flight }
    }
}

impl<S> Stream for Cursor<'_, S>
where
    S: Stream<Item = StoreResult<Row>> + Unpin,
{
    type Item = StoreResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let next = Pin::new(&mut this.rows).poll_next(cx);
        if let Poll::Ready(None) = next {
            *this.in_flight = false;
        }
        next
    }
}

fn build(query: &BoundQuery) -> QueryScalar<'_, Postgres, Json<Value>, PgArguments> {
    query
        .params()
        .iter()
        .fold(sqlx::query_scalar::<Postgres, Json<Value>>(query.sql()), |q, value| match value {
            SqlValue::Text(v) => q.bind(v.as_str()),
            SqlValue::Int4(v) => q.bind(*v),
            SqlValue::Int8(v) => q.bind(*v),
        })
}

#[async_trait]
impl Connection for PooledPgConnection {
    async fn fetch_all(&mut self, query: &BoundQuery) -> StoreResult<Vec<Row>> {
        let conn = self.conn.as_mut().ok_or(StoreError::Detached)?;
        // stays set if this future is dropped mid-read
        self.in_flight = true;
        let rows = build(query).fetch_all(&mut **conn).await;
        self.in_flight = false;
        Ok(rows?.into_iter().map(|Json(row)| row).collect())
    }

    fn fetch<'c>(&'c mut self, query: &'c BoundQuery) -> BoxStream<'c, StoreResult<Row>> {
        let Self { conn, in_flight } = self;
        let Some(conn) = conn.as_mut() else {
            return futures::stream::once(async { Err(StoreError::Detached) }).boxed();
        };
        let rows = build(query)
            .fetch(&mut **conn)
            .map_ok(|Json(row)| row)
            .map_err(StoreError::from);
        Cursor::new(rows, in_flight).boxed()
    }
}
