//! Request pipeline
//!
//! Every endpoint validates its input, then hands a [`Plan`] to [`run`]:
//!
//! ```text
//! Start -> Validating -> Leased -> (Probing) -> Querying -> Responding -> Released
//!              |            |           |            |
//!             400          5xx     404 / 5xx        5xx
//! ```
//!
//! Validation happens in the handler, before [`run`] is entered, so a
//! rejected request never touches the pool. From `Leased` on, the lease is
//! a scoped guard: every `?` releases it, and the paged branch releases it
//! explicitly before the body is built. In unpaged mode the lease moves
//! into the row producer and is released when the cursor ends.

use futures::{StreamExt, TryStreamExt};
use syncapi_store::{executor, ConnectionPool, PaginationMode, Query, Row};
use tracing::debug;

use crate::context::ApiContext;
use crate::error::{ApiError, ApiResult};
use crate::stream;
use axum::response::Response;

/// What a request produces when the main query returns no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnEmpty {
    /// 200 with `[]`
    EmptyArray,
    /// 404
    NotFound,
}

/// A validated request, ready to run
#[derive(Debug, Clone)]
pub struct Plan {
    /// Existence check run before the main query
    pub probe: Option<Query>,
    /// Main query
    pub query: Query,
    /// Page or stream
    pub mode: PaginationMode,
    /// Empty result handling
    pub on_empty: OnEmpty,
    /// Per-row projection applied before encoding
    pub project: fn(Row) -> Row,
}

impl Plan {
    /// Plan a main query with no probe, `[]` when empty and rows unchanged
    pub fn new(query: Query, mode: PaginationMode) -> Self {
        Self {
            probe: None,
            query,
            mode,
            on_empty: OnEmpty::EmptyArray,
            project: identity,
        }
    }

    /// Run `probe` first; a miss answers 404
    pub fn probe(mut self, probe: Query) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Answer 404 instead of `[]` when the main query is empty
    pub fn not_found_when_empty(mut self) -> Self {
        self.on_empty = OnEmpty::NotFound;
        self
    }

    /// Transform each row before it is encoded
    pub fn project(mut self, project: fn(Row) -> Row) -> Self {
        self.project = project;
        self
    }
}

fn identity(row: Row) -> Row {
    row
}

fn empty(on_empty: OnEmpty) -> ApiResult<Response> {
    match on_empty {
        OnEmpty::EmptyArray => stream::buffered(&[]),
        OnEmpty::NotFound => Err(ApiError::NotFound),
    }
}

/// Execute `plan` and build the response
pub async fn run<P: ConnectionPool>(ctx: &ApiContext<P>, plan: Plan) -> ApiResult<Response> {
    let Plan {
        probe,
        query,
        mode,
        on_empty,
        project,
    } = plan;

    let registry = ctx.registry();
    let main = registry.bind(&query, mode)?;
    let probe = probe.map(|q| registry.bind_probe(&q)).transpose()?;

    let mut lease = ctx.leases().acquire().await?;
    debug!(lease = lease.id(), statement = main.name(), ?mode, "leased");

    if let Some(probe) = probe {
        if !executor::exists(&mut *lease, &probe).await? {
            debug!(lease = lease.id(), statement = probe.name(), "probe negative");
            lease.release();
            return Err(ApiError::NotFound);
        }
    }

    match mode {
        PaginationMode::Paged { .. } => {
            let rows = executor::fetch_all(&mut *lease, &main).await?;
            lease.release();
            debug!(statement = main.name(), rows = rows.len(), "page fetched");
            if rows.is_empty() {
                return empty(on_empty);
            }
            let rows: Vec<Row> = rows.into_iter().map(project).collect();
            stream::buffered(&rows)
        }
        PaginationMode::Unpaged => {
            let name = main.name();
            let mut rows = executor::stream(lease, main, ctx.stream_buffer()).map_ok(project);
            match rows.next().await {
                None => {
                    debug!(statement = name, "stream empty");
                    empty(on_empty)
                }
                Some(Err(e)) => Err(e.into()),
                Some(Ok(first)) => {
                    debug!(statement = name, "streaming");
                    Ok(stream::streamed(first, rows, name))
                }
            }
        }
    }
}
