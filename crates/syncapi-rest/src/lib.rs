//! # syncapi-rest
//!
//! Read-only HTTP API over a ledger database.
//!
//! Every endpoint follows the same pipeline (see [`pipeline`]): validate
//! path and query parameters, lease a connection, optionally probe for the
//! resource, run the paged or unpaged statement, and release the lease on
//! every path.
//!
//! ## Usage
//!
//! ```ignore
//! use syncapi_rest::{ApiContext, ApiServer, Network, ServerConfig};
//! use syncapi_store::{PgConnectionPool, PgPoolConfig, StatementRegistry};
//!
//! let pool = PgConnectionPool::connect(&PgPoolConfig::default()).await?;
//! let ctx = ApiContext::new(pool, StatementRegistry::compile()?, Network::Mainnet);
//! let server = ApiServer::new(ServerConfig::default(), ctx);
//! server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `GET /accounts/{stake_address}/withdrawals` | Withdrawals of a stake address |
//! | `GET /epochs/{number}/stakes` | Stake distribution of an epoch |
//! | `GET /epochs/{number}/previous` | Epochs before an epoch |
//! | `GET /blocks/latest/txs` | Transaction hashes of the latest block |
//! | `GET /scripts` | Script hashes |
//! | `GET /metadata/txs/labels/{label}/cbor` | CBOR metadata of a label |
//!
//! ## Query parameters
//!
//! | Name | Values | Default |
//! |------|--------|---------|
//! | `order` | `asc`, `desc` | `asc` |
//! | `count` | `1..=100`, or `all` to stream the whole result | `100` |
//! | `page` | `1..=21474836` | `1` |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod network;
pub mod params;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod stream;

// Re-export main types
pub use context::{ApiContext, DEFAULT_STREAM_BUFFER};
pub use error::{ApiError, ApiResult, ErrorBody, ServerError, ServerResult, StreamError};
pub use network::Network;
pub use params::ListParams;
pub use pipeline::{OnEmpty, Plan};
pub use server::{build_router, ApiServer, ServerConfig};
pub use stream::JsonArrayEncoder;
