//! Storage error types

use thiserror::Error;

use crate::statement::{Slot, StatementId};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No connection became available within the acquire timeout
    #[error("timed out waiting for a pooled connection")]
    PoolTimedOut,

    /// The pool has been shut down
    #[error("connection pool is closed")]
    PoolClosed,

    /// Driver level failure
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Statement failed in a non-sqlx backend
    #[error("query failed: {0}")]
    Query(String),

    /// Template references a placeholder name that does not exist
    #[error("statement {statement} uses unknown placeholder :{name}")]
    UnknownPlaceholder {
        /// Offending statement
        statement: StatementId,
        /// Placeholder name as written
        name: String,
    },

    /// Template uses a slot the statement does not declare
    #[error("statement {statement} uses undeclared slot :{slot}")]
    UndeclaredSlot {
        /// Offending statement
        statement: StatementId,
        /// Slot found in the template
        slot: Slot,
    },

    /// Statement declares a slot its template never uses
    #[error("statement {statement} declares unused slot :{slot}")]
    UnusedSlot {
        /// Offending statement
        statement: StatementId,
        /// Declared slot
        slot: Slot,
    },

    /// Statement was not compiled into the registry
    #[error("statement not registered: {0}")]
    UnknownStatement(StatementId),

    /// A slot had no value at bind time
    #[error("no value bound for :{slot} in {statement}")]
    MissingBinding {
        /// Statement being bound
        statement: StatementId,
        /// Slot without a value
        slot: Slot,
    },

    /// The connection was already detached from its pool
    #[error("connection detached from the pool")]
    Detached,

    /// The background row producer stopped abnormally
    #[error("row producer failed: {0}")]
    Producer(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::PoolTimedOut,
            sqlx::Error::PoolClosed => StoreError::PoolClosed,
            other => StoreError::Database(other),
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
