//! In-memory backend
//!
//! Serves fixture rows keyed by statement and key parameter, applies the
//! bound sort order and paging itself, and counts every lease and produced
//! row so callers can assert on resource usage.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{StoreError, StoreResult};
use crate::lease::{Connection, ConnectionPool};
use crate::query::{BoundQuery, SqlValue};
use crate::statement::{Slot, StatementId};
use crate::Row;

/// Default time to wait for a free connection
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

type RowFn = dyn Fn(usize) -> Row + Send + Sync;

/// Rows behind one fixture
enum RowSource {
    Rows(Vec<Row>),
    Generated { count: usize, row: Box<RowFn> },
}

impl RowSource {
    fn len(&self) -> usize {
        match self {
            RowSource::Rows(rows) => rows.len(),
            RowSource::Generated { count, .. } => *count,
        }
    }

    fn row(&self, idx: usize) -> Row {
        match self {
            RowSource::Rows(rows) => rows.get(idx).cloned().unwrap_or(Row::Null),
            RowSource::Generated { row, .. } => row(idx),
        }
    }
}

type FixtureKey = (StatementId, Option<String>);

struct Inner {
    fixtures: RwLock<HashMap<FixtureKey, Arc<RowSource>>>,
    failures: RwLock<HashMap<StatementId, usize>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    acquired: AtomicU64,
    released: AtomicU64,
    rows_produced: AtomicU64,
    executed: Mutex<Vec<BoundQuery>>,
}

/// Connection pool backed by in-process fixtures
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<Inner>,
}

impl MemoryPool {
    /// Create a pool with `max_connections` connections
    pub fn new(max_connections: usize) -> Self {
        Self::with_acquire_timeout(max_connections, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Create a pool with a custom acquire timeout
    pub fn with_acquire_timeout(max_connections: usize, acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fixtures: RwLock::new(HashMap::new()),
                failures: RwLock::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(max_connections)),
                acquire_timeout,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                rows_produced: AtomicU64::new(0),
                executed: Mutex::new(Vec::new()),
            }),
        }
    }

    // ========== Fixtures ==========

    /// Serve `rows` for `statement`
    ///
    /// With `key` set, the rows are served only when the statement's key
    /// parameter (stake address, epoch or label) renders to `key`. A fixture
    /// without key matches any key that has no fixture of its own.
    pub fn insert_rows(&self, statement: StatementId, key: Option<&str>, rows: Vec<Row>) {
        self.insert(statement, key, RowSource::Rows(rows));
    }

    /// Serve `count` rows built on demand by `row`
    pub fn insert_generated<F>(&self, statement: StatementId, key: Option<&str>, count: usize, row: F)
    where
        F: Fn(usize) -> Row + Send + Sync + 'static,
    {
        self.insert(
            statement,
            key,
            RowSource::Generated {
                count,
                row: Box::new(row),
            },
        );
    }

    fn insert(&self, statement: StatementId, key: Option<&str>, source: RowSource) {
        self.inner
            .fixtures
            .write()
            .insert((statement, key.map(str::to_string)), Arc::new(source));
    }

    /// Fail every execution of `statement` after `rows` rows
    pub fn fail_after(&self, statement: StatementId, rows: usize) {
        self.inner.failures.write().insert(statement, rows);
    }

    /// Stop handing out connections
    pub fn close(&self) {
        self.inner.permits.close();
    }

    // ========== Counters ==========

    /// Leases handed out so far
    pub fn leases_acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Leases returned so far
    pub fn leases_released(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Leases currently held
    pub fn leases_outstanding(&self) -> u64 {
        self.leases_acquired() - self.leases_released()
    }

    /// Rows produced by all executions
    pub fn rows_produced(&self) -> u64 {
        self.inner.rows_produced.load(Ordering::SeqCst)
    }

    /// Every statement executed, in order
    pub fn executed(&self) -> Vec<BoundQuery> {
        self.inner.executed.lock().clone()
    }
}

#[async_trait]
impl ConnectionPool for MemoryPool {
    type Connection = MemoryConnection;

    async fn acquire(&self) -> StoreResult<MemoryConnection> {
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| StoreError::PoolTimedOut)?
        .map_err(|_| StoreError::PoolClosed)?;

        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            inner: self.inner.clone(),
            _permit: permit,
        })
    }
}

/// Connection handed out by [`MemoryPool`]
pub struct MemoryConnection {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

/// What one execution will produce
struct Plan {
    source: Option<Arc<RowSource>>,
    positions: Range<usize>,
    total: usize,
    descending: bool,
    fail_after: Option<usize>,
}

impl MemoryConnection {
    fn plan(&self, query: &BoundQuery) -> Plan {
        self.inner.executed.lock().push(query.clone());

        let key = query
            .statement()
            .slots()
            .iter()
            .find(|slot| slot.is_key())
            .and_then(|slot| query.value_of(*slot))
            .map(ToString::to_string);

        let source = {
            let fixtures = self.inner.fixtures.read();
            fixtures
                .get(&(query.id(), key))
                .or_else(|| fixtures.get(&(query.id(), None)))
                .cloned()
        };
        let total = source.as_ref().map_or(0, |s| s.len());

        let positions = match (query.value_of(Slot::Count), query.value_of(Slot::Page)) {
            (Some(SqlValue::Int8(count)), Some(SqlValue::Int8(page))) => {
                let count = usize::try_from(*count).unwrap_or(0);
                let page = usize::try_from(*page).unwrap_or(1).max(1);
                let start = (page - 1).saturating_mul(count).min(total);
                start..start.saturating_add(count).min(total)
            }
            _ => 0..total,
        };

        let descending = matches!(
            query.value_of(Slot::Order),
            Some(SqlValue::Text(order)) if order == "desc"
        );

        Plan {
            source,
            positions,
            total,
            descending,
            fail_after: self.inner.failures.read().get(&query.id()).copied(),
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn fetch_all(&mut self, query: &BoundQuery) -> StoreResult<Vec<Row>> {
        self.fetch(query).try_collect().await
    }

    fn fetch<'c>(&'c mut self, query: &'c BoundQuery) -> BoxStream<'c, StoreResult<Row>> {
        let Plan {
            source,
            positions,
            total,
            descending,
            fail_after,
        } = self.plan(query);

        let Some(source) = source else {
            return match fail_after {
                Some(_) => stream::iter([Err(StoreError::Query("injected failure".to_string()))]).boxed(),
                None => stream::empty().boxed(),
            };
        };

        let emitted = fail_after.map_or(positions.len(), |n| n.min(positions.len()));
        let inner = self.inner.clone();
        let rows = stream::iter(positions.take(emitted)).map(move |pos| {
            let idx = if descending { total - 1 - pos } else { pos };
            inner.rows_produced.fetch_add(1, Ordering::SeqCst);
            Ok(source.row(idx))
        });
        let failure = stream::iter(
            fail_after.map(|_| Err(StoreError::Query("injected failure".to_string()))),
        );
        rows.chain(failure).boxed()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}
