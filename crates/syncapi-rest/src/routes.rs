//! Endpoint handlers
//!
//! | Path | Key | Probe | Empty result |
//! |------|-----|-------|--------------|
//! | `/accounts/:stake_address/withdrawals` | stake address | account | `[]` |
//! | `/epochs/:number/stakes` | epoch | epoch | `[]` |
//! | `/epochs/:number/previous` | epoch | epoch | `[]` |
//! | `/blocks/latest/txs` | - | - | `[]` |
//! | `/scripts` | - | - | `[]` |
//! | `/metadata/txs/labels/:label/cbor` | label | - | 404 |

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query as QueryString, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use syncapi_store::{ConnectionPool, Query, Row};
use syncapi_validation::{parse_positive_i32, parse_positive_i64, validate, ParamKind, StakeAddress};

use crate::context::ApiContext;
use crate::error::{ApiError, ApiResult};
use crate::network::Network;
use crate::params::ListParams;
use crate::pipeline::{self, Plan};

/// 400 message for a bad stake address
pub const INVALID_STAKE_ADDRESS: &str = "Invalid or malformed stake address format.";
/// 400 message for a bad epoch number
pub const INVALID_EPOCH: &str = "Missing, out of range or malformed epoch_number.";
/// 400 message for a bad metadata label
pub const INVALID_LABEL: &str = "Missing, out of range or malformed label.";

type Ctx<P> = State<Arc<ApiContext<P>>>;
type ListQuery = Result<QueryString<ListParams>, QueryRejection>;
type PathParam = Result<Path<String>, PathRejection>;

/// Every endpoint, with a structured 404 for anything else
pub fn router<P: ConnectionPool>() -> Router<Arc<ApiContext<P>>> {
    Router::new()
        .route("/accounts/:stake_address/withdrawals", get(account_withdrawals::<P>))
        .route("/epochs/:number/stakes", get(epoch_stakes::<P>))
        .route("/epochs/:number/previous", get(epochs_previous::<P>))
        .route("/blocks/latest/txs", get(blocks_latest_txs::<P>))
        .route("/scripts", get(scripts::<P>))
        .route("/metadata/txs/labels/:label/cbor", get(metadata_label_cbor::<P>))
        .fallback(not_found)
}

// ========== Key parameters ==========

/// Raw path key, rejected unless well-formed for `kind`
fn path_key(path: PathParam, kind: ParamKind, message: &str) -> ApiResult<String> {
    match path {
        Ok(Path(raw)) if validate(kind, Some(&raw)) => Ok(raw),
        _ => Err(ApiError::BadRequest(message.to_string())),
    }
}

/// Canonical form of a stake address on `network`
pub fn stake_address(network: Network, raw: &str) -> ApiResult<String> {
    StakeAddress::parse(raw)
        .ok()
        .filter(|address| address.is_mainnet() == network.is_mainnet())
        .map(|address| address.to_bech32())
        .ok_or_else(|| ApiError::BadRequest(INVALID_STAKE_ADDRESS.to_string()))
}

/// Epoch number
pub fn epoch_number(raw: &str) -> ApiResult<i32> {
    parse_positive_i32(raw).map_err(|_| ApiError::BadRequest(INVALID_EPOCH.to_string()))
}

/// Metadata label
pub fn metadata_label(raw: &str) -> ApiResult<i64> {
    parse_positive_i64(raw).map_err(|_| ApiError::BadRequest(INVALID_LABEL.to_string()))
}

fn tx_hash_only(row: Row) -> Row {
    match row {
        Row::Object(mut fields) => fields.remove("hash").unwrap_or(Row::Null),
        other => other,
    }
}

// ========== Handlers ==========

async fn account_withdrawals<P: ConnectionPool>(
    State(ctx): Ctx<P>,
    path: PathParam,
    query: ListQuery,
) -> ApiResult<Response> {
    let raw = path_key(path, ParamKind::StakeAddress, INVALID_STAKE_ADDRESS)?;
    let stake_address = stake_address(ctx.network(), &raw)?;
    let params = ListParams::extract(query)?;
    let plan = Plan::new(
        Query::AccountWithdrawals {
            order: params.order()?,
            stake_address: stake_address.clone(),
        },
        params.pagination()?,
    )
    .probe(Query::AccountExists { stake_address });
    pipeline::run(&ctx, plan).await
}

async fn epoch_stakes<P: ConnectionPool>(
    State(ctx): Ctx<P>,
    path: PathParam,
    query: ListQuery,
) -> ApiResult<Response> {
    let epoch = epoch_number(&path_key(path, ParamKind::PositiveSignedInt, INVALID_EPOCH)?)?;
    let params = ListParams::extract(query)?;
    let plan = Plan::new(Query::EpochStakes { epoch }, params.pagination()?)
        .probe(Query::EpochExists { epoch });
    pipeline::run(&ctx, plan).await
}

async fn epochs_previous<P: ConnectionPool>(
    State(ctx): Ctx<P>,
    path: PathParam,
    query: ListQuery,
) -> ApiResult<Response> {
    let epoch = epoch_number(&path_key(path, ParamKind::PositiveSignedInt, INVALID_EPOCH)?)?;
    let params = ListParams::extract(query)?;
    let plan = Plan::new(
        Query::EpochsPrevious {
            epoch,
            epoch_length: ctx.network().epoch_length(),
        },
        params.pagination()?,
    )
    .probe(Query::EpochExists { epoch });
    pipeline::run(&ctx, plan).await
}

async fn blocks_latest_txs<P: ConnectionPool>(
    State(ctx): Ctx<P>,
    query: ListQuery,
) -> ApiResult<Response> {
    let params = ListParams::extract(query)?;
    let plan = Plan::new(
        Query::BlocksLatestTxs {
            order: params.order()?,
        },
        params.pagination()?,
    )
    .project(tx_hash_only);
    pipeline::run(&ctx, plan).await
}

async fn scripts<P: ConnectionPool>(State(ctx): Ctx<P>, query: ListQuery) -> ApiResult<Response> {
    let params = ListParams::extract(query)?;
    let plan = Plan::new(
        Query::Scripts {
            order: params.order()?,
        },
        params.pagination()?,
    );
    pipeline::run(&ctx, plan).await
}

async fn metadata_label_cbor<P: ConnectionPool>(
    State(ctx): Ctx<P>,
    path: PathParam,
    query: ListQuery,
) -> ApiResult<Response> {
    let label = metadata_label(&path_key(path, ParamKind::PositiveSignedBigInt, INVALID_LABEL)?)?;
    let params = ListParams::extract(query)?;
    let plan = Plan::new(
        Query::MetadataLabelCbor {
            order: params.order()?,
            label,
        },
        params.pagination()?,
    )
    .not_found_when_empty();
    pipeline::run(&ctx, plan).await
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
