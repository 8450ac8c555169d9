//! JSON array responses
//!
//! Two emission strategies:
//!
//! - [`buffered`]: the whole array serialized into one body
//! - [`streamed`]: `[`, then one chunk per row, then `]`, pulled by the
//!   HTTP transport so a slow client suspends the row producer
//!
//! [`JsonArrayEncoder`] is the only way a response bypasses buffering.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{ready, Stream, StreamExt};
use syncapi_store::{Row, StoreResult};

use crate::error::{ApiResult, StreamError};

const APPLICATION_JSON: &str = "application/json";

/// Incremental JSON array writer
#[derive(Debug, Default)]
pub struct JsonArrayEncoder {
    elements: usize,
}

impl JsonArrayEncoder {
    /// Create an encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening bracket
    pub fn open(&self) -> Bytes {
        Bytes::from_static(b"[")
    }

    /// One element, prefixed with a separator after the first
    pub fn element(&mut self, row: &Row) -> serde_json::Result<Bytes> {
        let mut buf = Vec::with_capacity(128);
        if self.elements > 0 {
            buf.push(b',');
        }
        serde_json::to_writer(&mut buf, row)?;
        self.elements += 1;
        Ok(Bytes::from(buf))
    }

    /// Closing bracket
    pub fn close(&self) -> Bytes {
        Bytes::from_static(b"]")
    }

    /// Elements written so far
    pub fn elements(&self) -> usize {
        self.elements
    }
}

/// Serialize `rows` into a single 200 response
pub fn buffered(rows: &[Row]) -> ApiResult<Response> {
    let body = serde_json::to_vec(rows)?;
    Ok(json_response(Body::from(body)))
}

/// Stream `first` followed by `rest` as a 200 response
pub fn streamed<S>(first: Row, rest: S, statement: &'static str) -> Response
where
    S: Stream<Item = StoreResult<Row>> + Unpin + Send + 'static,
{
    let rows = futures::stream::iter([Ok(first)]).chain(rest);
    json_response(Body::from_stream(JsonArrayBody::new(rows, statement)))
}

fn json_response(body: Body) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

enum State {
    Open,
    Rows,
    Closed,
}

/// Body stream wrapping a row stream in array brackets
pub struct JsonArrayBody<S> {
    rows: S,
    encoder: JsonArrayEncoder,
    state: State,
    statement: &'static str,
}

impl<S> JsonArrayBody<S> {
    /// Wrap `rows`
    pub fn new(rows: S, statement: &'static str) -> Self {
        Self {
            rows,
            encoder: JsonArrayEncoder::new(),
            state: State::Open,
            statement,
        }
    }
}

impl<S> Stream for JsonArrayBody<S>
where
    S: Stream<Item = StoreResult<Row>> + Unpin,
{
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.state {
            State::Open => {
                this.state = State::Rows;
                Poll::Ready(Some(Ok(this.encoder.open())))
            }
            State::Rows => match ready!(this.rows.poll_next_unpin(cx)) {
                Some(Ok(row)) => match this.encoder.element(&row) {
                    Ok(chunk) => Poll::Ready(Some(Ok(chunk))),
                    Err(e) => {
                        this.state = State::Closed;
                        tracing::error!(statement = this.statement, error = %e, "row encoding failed");
                        Poll::Ready(Some(Err(e.into())))
                    }
                },
                Some(Err(e)) => {
                    this.state = State::Closed;
                    tracing::error!(
                        statement = this.statement,
                        rows = this.encoder.elements(),
                        error = %e,
                        "query failed mid-stream, aborting response"
                    );
                    Poll::Ready(Some(Err(e.into())))
                }
                None => {
                    this.state = State::Closed;
                    tracing::debug!(
                        statement = this.statement,
                        rows = this.encoder.elements(),
                        "stream complete"
                    );
                    Poll::Ready(Some(Ok(this.encoder.close())))
                }
            },
            State::Closed => Poll::Ready(None),
        }
    }
}

impl<S> Drop for JsonArrayBody<S> {
    fn drop(&mut self) {
        if !matches!(self.state, State::Closed) {
            tracing::warn!(
                statement = self.statement,
                rows = self.encoder.elements(),
                "client went away mid-stream"
            );
        }
    }
}
