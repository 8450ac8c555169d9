//! Query string parameters and pagination policy

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use serde::Deserialize;
use syncapi_store::{PaginationMode, SortOrder};

use crate::error::{ApiError, ApiResult};

/// Largest page size
pub const MAX_COUNT: u32 = 100;

/// Page size when `count` is absent
pub const DEFAULT_COUNT: u32 = 100;

/// Largest page index
pub const MAX_PAGE: u32 = 21_474_836;

/// `count` value requesting the whole result set
pub const UNPAGED_COUNT: &str = "all";

/// Raw list parameters, exactly as they arrived
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    /// `asc` or `desc`
    pub order: Option<String>,
    /// Page size or `all`
    pub count: Option<String>,
    /// 1-based page index
    pub page: Option<String>,
}

impl ListParams {
    /// Unwrap the extractor, turning a malformed query string into a 400
    pub fn extract(query: Result<Query<ListParams>, QueryRejection>) -> ApiResult<Self> {
        query
            .map(|Query(params)| params)
            .map_err(|e| ApiError::BadRequest(e.body_text()))
    }

    /// Validated sort order
    pub fn order(&self) -> ApiResult<SortOrder> {
        match self.order.as_deref() {
            None => Ok(SortOrder::default()),
            Some(raw) => raw.parse().map_err(|_| {
                ApiError::BadRequest(
                    "querystring/order must be equal to one of the allowed values".to_string(),
                )
            }),
        }
    }

    /// Decide between one bounded page and the whole result set
    pub fn pagination(&self) -> ApiResult<PaginationMode> {
        let page = match self.page.as_deref() {
            None => 1,
            Some(raw) => bounded("page", raw, MAX_PAGE)?,
        };
        match self.count.as_deref() {
            Some(UNPAGED_COUNT) => Ok(PaginationMode::Unpaged),
            None => Ok(PaginationMode::Paged {
                count: DEFAULT_COUNT,
                page,
            }),
            Some(raw) => Ok(PaginationMode::Paged {
                count: bounded("count", raw, MAX_COUNT)?,
                page,
            }),
        }
    }
}

fn bounded(name: &str, raw: &str, max: u32) -> ApiResult<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("querystring/{} must be integer", name)));
    }
    // digits only, so a parse failure means overflow
    let value = raw.parse::<u64>().unwrap_or(u64::MAX);
    if value < 1 {
        return Err(ApiError::BadRequest(format!("querystring/{} must be >= 1", name)));
    }
    if value > u64::from(max) {
        return Err(ApiError::BadRequest(format!("querystring/{} must be <= {}", name, max)));
    }
    Ok(value as u32)
}
