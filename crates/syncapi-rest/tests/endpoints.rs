//! End-to-end tests of the HTTP surface over the in-memory backend

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use syncapi_rest::routes::{INVALID_EPOCH, INVALID_LABEL, INVALID_STAKE_ADDRESS};
use syncapi_rest::{build_router, ApiContext, ErrorBody, Network};
use syncapi_store::{MemoryPool, Slot, SqlValue, StatementId, StatementRegistry};
use tower::ServiceExt;

const BUFFER: usize = 16;
const MAINNET_ADDRESS: &str = "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw";

fn app_on(pool: &MemoryPool, network: Network) -> Router {
    let ctx = ApiContext::new(pool.clone(), StatementRegistry::compile().unwrap(), network)
        .with_stream_buffer(BUFFER);
    build_router(Arc::new(ctx), false)
}

fn app(pool: &MemoryPool) -> Router {
    app_on(pool, Network::Mainnet)
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(req).await.unwrap()
}

async fn get_body(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let resp = get(app, uri).await;
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get_body(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn error_body(status: StatusCode, body: &Value) -> ErrorBody {
    let parsed: ErrorBody = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(parsed.status_code, status.as_u16());
    parsed
}

async fn settle(pool: &MemoryPool) {
    for _ in 0..200 {
        if pool.leases_outstanding() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn numbered(pool: &MemoryPool, statement: StatementId, count: usize) {
    pool.insert_generated(statement, None, count, |i| json!({ "n": i }));
}

// ===== Validation =====

#[tokio::test]
async fn test_invalid_stake_address_never_leases() {
    let pool = MemoryPool::new(2);
    let (status, body) = get_json(app(&pool), "/accounts/stake1u9/withdrawals").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = error_body(status, &body);
    assert_eq!(err.error, "Bad Request");
    assert_eq!(err.message, INVALID_STAKE_ADDRESS);
    assert_eq!(pool.leases_acquired(), 0);
    assert!(pool.executed().is_empty());
}

#[tokio::test]
async fn test_testnet_address_rejected_on_mainnet() {
    let pool = MemoryPool::new(2);
    let testnet = "stake_test1uqehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gssrtvn";
    let (status, body) = get_json(app(&pool), &format!("/accounts/{testnet}/withdrawals")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(status, &body).message, INVALID_STAKE_ADDRESS);
    assert_eq!(pool.leases_acquired(), 0);
}

#[tokio::test]
async fn test_epoch_out_of_range() {
    let pool = MemoryPool::new(2);
    for uri in ["/epochs/2147483648/stakes", "/epochs/abc/previous", "/epochs/-4/stakes"] {
        let (status, body) = get_json(app(&pool), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_body(status, &body).message, INVALID_EPOCH);
    }
    assert_eq!(pool.leases_acquired(), 0);
}

#[tokio::test]
async fn test_label_out_of_range() {
    let pool = MemoryPool::new(2);
    let (status, body) = get_json(app(&pool), "/metadata/txs/labels/9223372036854775808/cbor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(status, &body).message, INVALID_LABEL);
    assert_eq!(pool.leases_acquired(), 0);
}

#[tokio::test]
async fn test_bad_query_parameters() {
    let pool = MemoryPool::new(2);
    for (uri, message) in [
        ("/scripts?count=0", "querystring/count must be >= 1"),
        ("/scripts?count=101", "querystring/count must be <= 100"),
        ("/scripts?page=21474837", "querystring/page must be <= 21474836"),
        ("/scripts?order=up", "querystring/order must be equal to one of the allowed values"),
    ] {
        let (status, body) = get_json(app(&pool), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_body(status, &body).message, message);
    }
    assert_eq!(pool.leases_acquired(), 0);
}

// ===== Probes =====

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let pool = MemoryPool::new(2);
    let (status, body) = get_json(app(&pool), &format!("/accounts/{MAINNET_ADDRESS}/withdrawals")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "status_code": 404,
            "error": "Not Found",
            "message": "The requested component has not been found."
        })
    );
    assert_eq!(pool.leases_acquired(), 1);
    assert_eq!(pool.leases_released(), 1);
}

#[tokio::test]
async fn test_known_account_without_withdrawals() {
    let pool = MemoryPool::new(2);
    pool.insert_rows(StatementId::AccountExists, Some(MAINNET_ADDRESS), vec![json!({ "id": 1 })]);

    for uri in [
        format!("/accounts/{MAINNET_ADDRESS}/withdrawals"),
        format!("/accounts/{MAINNET_ADDRESS}/withdrawals?count=all"),
    ] {
        let (status, body) = get_body(app(&pool), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"[]");
    }
    assert_eq!(pool.leases_acquired(), 2);
    assert_eq!(pool.leases_released(), 2);
}

#[tokio::test]
async fn test_account_binds_canonical_address() {
    let pool = MemoryPool::new(2);
    pool.insert_rows(StatementId::AccountExists, Some(MAINNET_ADDRESS), vec![json!({ "id": 1 })]);
    pool.insert_rows(
        StatementId::AccountWithdrawals,
        Some(MAINNET_ADDRESS),
        vec![json!({ "tx_hash": "aa", "amount": "10" })],
    );

    let uri = format!("/accounts/{}/withdrawals", MAINNET_ADDRESS.to_uppercase());
    let (status, body) = get_json(app(&pool), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "tx_hash": "aa", "amount": "10" }]));
}

#[tokio::test]
async fn test_unknown_epoch_is_not_found() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::EpochStakes, 3);

    let (status, _) = get_json(app(&pool), "/epochs/500/stakes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let statements: Vec<_> = pool.executed().iter().map(|q| q.id()).collect();
    assert_eq!(statements, vec![StatementId::EpochExists]);
}

#[tokio::test]
async fn test_previous_epochs_bind_network_epoch_length() {
    for (network, length) in [(Network::Mainnet, 432_000), (Network::Preview, 86_400)] {
        let pool = MemoryPool::new(2);
        pool.insert_rows(StatementId::EpochExists, Some("208"), vec![json!({ "no": 208 })]);
        numbered(&pool, StatementId::EpochsPrevious, 2);

        let (status, body) = get_json(app_on(&pool, network), "/epochs/208/previous").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{ "n": 0 }, { "n": 1 }]));

        let executed = pool.executed();
        assert_eq!(executed[1].id(), StatementId::EpochsPrevious);
        assert_eq!(executed[1].value_of(Slot::EpochLength), Some(&SqlValue::Int8(length)));
        assert_eq!(executed[1].value_of(Slot::Epoch), Some(&SqlValue::Int4(208)));
    }
}

// ===== Paged =====

#[tokio::test]
async fn test_paged_length_and_order() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 250);

    let (status, body) = get_json(app(&pool), "/scripts?order=desc&count=100&page=3").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 50);
    assert_eq!(rows[0], json!({ "n": 49 }));
    assert_eq!(rows[49], json!({ "n": 0 }));

    let (_, body) = get_json(app(&pool), "/scripts?count=7").await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 7);
    assert!(rows.windows(2).all(|w| w[0]["n"].as_u64() < w[1]["n"].as_u64()));

    assert_eq!(pool.leases_outstanding(), 0);
}

#[tokio::test]
async fn test_paged_beyond_last_page_is_empty() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 5);
    let (status, body) = get_body(app(&pool), "/scripts?count=10&page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"[]");
}

#[tokio::test]
async fn test_latest_block_txs_project_hash() {
    let pool = MemoryPool::new(2);
    pool.insert_rows(
        StatementId::BlocksLatestTxs,
        None,
        vec![json!({ "hash": "aa" }), json!({ "hash": "bb" })],
    );
    let (status, body) = get_json(app(&pool), "/blocks/latest/txs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["aa", "bb"]));

    let (_, body) = get_json(app(&pool), "/blocks/latest/txs?order=desc&count=all").await;
    assert_eq!(body, json!(["bb", "aa"]));
}

#[tokio::test]
async fn test_metadata_label_empty_is_not_found() {
    let pool = MemoryPool::new(2);
    pool.insert_rows(
        StatementId::MetadataLabelCbor,
        Some("1990"),
        vec![json!({ "tx_hash": "aa", "cbor_metadata": "a1", "metadata": "a1" })],
    );

    let (status, _) = get_json(app(&pool), "/metadata/txs/labels/1990/cbor").await;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/metadata/txs/labels/1991/cbor", "/metadata/txs/labels/1991/cbor?count=all"] {
        let (status, body) = get_json(app(&pool), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_body(status, &body), ErrorBody::not_found());
    }
    assert_eq!(pool.leases_outstanding(), 0);
}

// ===== Unpaged =====

#[tokio::test]
async fn test_unpaged_three_rows_exact_body() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 3);

    let resp = get(app(&pool), "/scripts?count=all").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], br#"[{"n":0},{"n":1},{"n":2}]"#);
    assert_eq!(pool.leases_acquired(), 1);
    assert_eq!(pool.leases_released(), 1);
}

#[tokio::test]
async fn test_unpaged_memory_is_bounded() {
    const ROWS: u64 = 100_000;
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, ROWS as usize);

    let resp = get(app(&pool), "/scripts?count=all").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut chunks = resp.into_body().into_data_stream();
    let opening = chunks.next().await.unwrap().unwrap();
    assert_eq!(&opening[..], b"[");

    let mut consumed = 0u64;
    let mut last = Bytes::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.unwrap();
        if &chunk[..] != b"]" {
            consumed += 1;
        }
        last = chunk;
        // channel capacity, one row parked in the producer, one peeked
        assert!(
            pool.rows_produced() <= consumed + BUFFER as u64 + 2,
            "produced {} with {} consumed",
            pool.rows_produced(),
            consumed
        );
    }

    assert_eq!(consumed, ROWS);
    assert_eq!(&last[..], b"]");
    assert_eq!(pool.rows_produced(), ROWS);
    assert_eq!(pool.leases_released(), 1);
}

#[tokio::test]
async fn test_client_disconnect_releases_lease() {
    let pool = MemoryPool::new(1);
    numbered(&pool, StatementId::Scripts, 100_000);

    let resp = get(app(&pool), "/scripts?count=all").await;
    let mut chunks = resp.into_body().into_data_stream();
    for _ in 0..3 {
        chunks.next().await.unwrap().unwrap();
    }
    drop(chunks);

    settle(&pool).await;
    assert_eq!(pool.leases_acquired(), 1);
    assert_eq!(pool.leases_released(), 1);
    assert!(pool.rows_produced() < 100_000);

    // the single connection is usable again
    let (status, _) = get_body(app(&pool), "/scripts?count=1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_mid_stream_failure_aborts_body() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 10);
    pool.fail_after(StatementId::Scripts, 5);

    let resp = get(app(&pool), "/scripts?count=all").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(axum::body::to_bytes(resp.into_body(), usize::MAX).await.is_err());

    settle(&pool).await;
    assert_eq!(pool.leases_acquired(), 1);
    assert_eq!(pool.leases_released(), 1);
}

#[tokio::test]
async fn test_identical_requests_identical_bodies() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 300);

    for uri in ["/scripts?count=50&page=2", "/scripts?count=all&order=desc"] {
        let (_, first) = get_body(app(&pool), uri).await;
        let (_, second) = get_body(app(&pool), uri).await;
        assert_eq!(first, second, "{uri}");
    }
}

#[tokio::test]
async fn test_streamed_and_paged_encodings_agree() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 40);

    let (_, paged) = get_body(app(&pool), "/scripts?count=100").await;
    let (_, streamed) = get_body(app(&pool), "/scripts?count=all").await;
    assert_eq!(paged, streamed);
}

// ===== Store failures =====

#[tokio::test]
async fn test_query_failure_is_internal_error() {
    let pool = MemoryPool::new(2);
    numbered(&pool, StatementId::Scripts, 10);
    pool.fail_after(StatementId::Scripts, 0);

    for uri in ["/scripts", "/scripts?count=all"] {
        let (status, body) = get_json(app(&pool), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_body(status, &body), ErrorBody::internal());
    }
    assert_eq!(pool.leases_acquired(), 2);
    assert_eq!(pool.leases_released(), 2);
}

#[tokio::test]
async fn test_acquire_timeout_is_internal_error() {
    let pool = MemoryPool::with_acquire_timeout(0, Duration::from_millis(10));
    let (status, body) = get_json(app(&pool), "/scripts").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(status, &body), ErrorBody::internal());
    assert_eq!(pool.leases_acquired(), 0);
}

#[tokio::test]
async fn test_closed_pool_is_internal_error() {
    let pool = MemoryPool::new(2);
    pool.close();
    let (status, _) = get_json(app(&pool), "/blocks/latest/txs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ===== Routing =====

#[tokio::test]
async fn test_unknown_route_is_structured_not_found() {
    let pool = MemoryPool::new(2);
    let (status, body) = get_json(app(&pool), "/does/not/exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_body(status, &body), ErrorBody::not_found());
}
