//! # syncapi-store
//!
//! Data access layer for the ledger query API.
//!
//! This crate provides:
//! - Connection leasing with release on every exit path ([`Lease`], [`LeaseManager`])
//! - Typed statement identifiers and a single template per statement that
//!   compiles into paged and unpaged variants ([`StatementRegistry`])
//! - Query execution, existence probing and bounded row streaming ([`executor`])
//! - A Postgres backend on `sqlx` ([`PgConnectionPool`])
//! - An in-memory backend for tests and local development ([`MemoryPool`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod lease;
pub mod memory;
pub mod pagination;
pub mod postgres;
pub mod query;
pub mod statement;

pub use error::{StoreError, StoreResult};
pub use executor::RowStream;
pub use lease::{Connection, ConnectionPool, Lease, LeaseManager};
pub use memory::{MemoryConnection, MemoryPool};
pub use pagination::{PaginationMode, SortOrder, Variant};
pub use postgres::{PgConnectionPool, PgPoolConfig, PooledPgConnection};
pub use query::{BoundQuery, CompiledStatement, Query, SqlValue, StatementRegistry};
pub use statement::{Slot, StatementId};

/// A single result row, exactly as the statement shaped it
pub type Row = serde_json::Value;
