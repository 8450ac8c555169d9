//! Statement execution
//!
//! Three ways to run a [`BoundQuery`]:
//!
//! | Function | Lease | Rows |
//! |----------|-------|------|
//! | [`fetch_all`] | borrowed | materialized |
//! | [`exists`] | borrowed | first row only |
//! | [`stream`] | moved into a producer task | bounded channel |
//!
//! Rows are returned in the order the statement produces them and store
//! errors propagate unmodified.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::lease::{Connection, Lease};
use crate::query::BoundQuery;
use crate::Row;

/// Run `query` and collect every row
pub async fn fetch_all<C: Connection>(conn: &mut C, query: &BoundQuery) -> StoreResult<Vec<Row>> {
    trace!(statement = query.name(), params = query.params().len(), "fetch_all");
    conn.fetch_all(query).await
}

/// Whether `query` yields at least one row
pub async fn exists<C: Connection>(conn: &mut C, query: &BoundQuery) -> StoreResult<bool> {
    trace!(statement = query.name(), "probe");
    let mut rows = conn.fetch(query);
    let found = rows.try_next().await?.is_some();
    // probes are LIMIT 1; reading to the end leaves the connection idle
    while rows.try_next().await?.is_some() {}
    Ok(found)
}

/// Stream the rows of `query` through a channel of `buffer` rows
///
/// The lease moves into a background producer and is released when the
/// cursor is exhausted, fails, or the returned [`RowStream`] is dropped.
/// The stream ends only after the producer has finished, so by the time
/// it yields `None` the lease is back in the pool.
pub fn stream<C: Connection>(lease: Lease<C>, query: BoundQuery, buffer: usize) -> RowStream {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    let producer = tokio::spawn(async move {
        let mut lease = lease;
        let mut produced = 0u64;
        {
            let mut rows = lease.fetch(&query);
            while let Some(item) = rows.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!(statement = query.name(), produced, "row consumer went away");
                    break;
                }
                if failed {
                    break;
                }
                produced += 1;
            }
        }
        trace!(lease = lease.id(), statement = query.name(), produced, "producer finished");
        lease.release();
    });

    RowStream {
        rx,
        producer: Some(producer),
    }
}

/// Rows of an unpaged query, produced in the background
///
/// Dropping the stream aborts the producer, which abandons the cursor and
/// releases its lease. A backend that still has rows in flight closes the
/// connection rather than reading them.
pub struct RowStream {
    rx: mpsc::Receiver<StoreResult<Row>>,
    producer: Option<JoinHandle<()>>,
}

impl Stream for RowStream {
    type Item = StoreResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {}
        }

        // channel closed: wait for the producer to drop its lease
        let Some(handle) = this.producer.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.producer = None;
                match result {
                    Ok(()) => Poll::Ready(None),
                    Err(e) => Poll::Ready(Some(Err(StoreError::Producer(e.to_string())))),
                }
            }
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::LeaseManager;
    use crate::memory::MemoryPool;
    use crate::pagination::{PaginationMode, SortOrder};
    use crate::query::{Query, StatementRegistry};
    use crate::statement::StatementId;
    use serde_json::json;
    use std::time::Duration;

    fn scripts(order: SortOrder) -> Query {
        Query::Scripts { order }
    }

    fn setup(rows: usize) -> (MemoryPool, LeaseManager<MemoryPool>, StatementRegistry) {
        let pool = MemoryPool::new(2);
        pool.insert_generated(StatementId::Scripts, None, rows, |i| json!({ "script_hash": i }));
        let manager = LeaseManager::new(pool.clone());
        (pool, manager, StatementRegistry::compile().unwrap())
    }

    async fn settle(pool: &MemoryPool) {
        for _ in 0..100 {
            if pool.leases_outstanding() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    // ===== Materialized =====

    #[tokio::test]
    async fn test_fetch_all_pages() {
        let (_pool, manager, registry) = setup(25);
        let query = registry
            .bind(&scripts(SortOrder::Asc), PaginationMode::Paged { count: 10, page: 3 })
            .unwrap();
        let mut lease = manager.acquire().await.unwrap();
        let rows = fetch_all(&mut *lease, &query).await.unwrap();
        assert_eq!(
            rows,
            (20..25).map(|i| json!({ "script_hash": i })).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_exists() {
        let (pool, manager, registry) = setup(0);
        pool.insert_rows(StatementId::EpochExists, Some("5"), vec![json!({ "no": 5 })]);

        let mut lease = manager.acquire().await.unwrap();
        let known = registry.bind_probe(&Query::EpochExists { epoch: 5 }).unwrap();
        let unknown = registry.bind_probe(&Query::EpochExists { epoch: 6 }).unwrap();
        assert!(exists(&mut *lease, &known).await.unwrap());
        assert!(!exists(&mut *lease, &unknown).await.unwrap());
    }

    // ===== Streaming =====

    #[tokio::test]
    async fn test_stream_yields_all_rows_then_releases() {
        let (pool, manager, registry) = setup(50);
        let query = registry.bind(&scripts(SortOrder::Desc), PaginationMode::Unpaged).unwrap();
        let lease = manager.acquire().await.unwrap();

        let rows: Vec<Row> = stream(lease, query, 4).try_collect().await.unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0], json!({ "script_hash": 49 }));
        assert_eq!(pool.leases_outstanding(), 0);
        assert_eq!(pool.leases_released(), 1);
    }

    #[tokio::test]
    async fn test_stream_is_bounded_by_buffer() {
        let (pool, manager, registry) = setup(10_000);
        let query = registry.bind(&scripts(SortOrder::Asc), PaginationMode::Unpaged).unwrap();
        let lease = manager.acquire().await.unwrap();

        let mut rows = stream(lease, query, 8);
        let mut consumed = 0u64;
        while let Some(row) = rows.next().await {
            row.unwrap();
            consumed += 1;
            if consumed % 1_000 == 0 {
                tokio::task::yield_now().await;
                assert!(pool.rows_produced() <= consumed + 8 + 1);
            }
        }
        assert_eq!(consumed, 10_000);
    }

    #[tokio::test]
    async fn test_stream_drop_releases_lease() {
        let (pool, manager, registry) = setup(10_000);
        let query = registry.bind(&scripts(SortOrder::Asc), PaginationMode::Unpaged).unwrap();
        let lease = manager.acquire().await.unwrap();

        let mut rows = stream(lease, query, 4);
        rows.next().await.unwrap().unwrap();
        drop(rows);

        settle(&pool).await;
        assert_eq!(pool.leases_outstanding(), 0);
        assert_eq!(pool.leases_released(), 1);
        assert!(pool.rows_produced() < 10_000);
    }

    #[tokio::test]
    async fn test_stream_forwards_failure_and_releases() {
        let (pool, manager, registry) = setup(100);
        pool.fail_after(StatementId::Scripts, 3);
        let query = registry.bind(&scripts(SortOrder::Asc), PaginationMode::Unpaged).unwrap();
        let lease = manager.acquire().await.unwrap();

        let items: Vec<StoreResult<Row>> = stream(lease, query, 4).collect().await;
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(|r| r.is_ok()));
        assert!(matches!(items[3], Err(StoreError::Query(_))));
        assert_eq!(pool.leases_released(), 1);
    }
}
