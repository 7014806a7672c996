use crate::error::{AppError, AppResult};
use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;
/// Highest page whose row offset still fits a Postgres `bigint` at the
/// largest page size.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct PaginationQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
}

impl PaginationQuery {
    /// Resolve to a `(page, per_page)` pair: pages fall in `1..=MAX_PAGE`
    /// and page size in `1..=MAX_PER_PAGE`.
    pub fn resolve(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// Zero-based page index for sea-orm's paginator, rejecting pages whose
/// row offset would not fit a `bigint`.
pub fn page_index(page: u64, per_page: u64) -> AppResult<u64> {
    let index = page.saturating_sub(1);
    match index.checked_mul(per_page) {
        Some(offset) if offset <= i64::MAX as u64 => Ok(index),
        _ => Err(AppError::Validation(format!(
            "page must be at most {}",
            i64::MAX as u64 / per_page.max(1) + 1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_basic() {
        let resp = PaginatedResponse::<String>::new(vec![], 100, 1, 20);
        assert_eq!(resp.total_pages, 5);
    }

    #[test]
    fn total_pages_with_remainder() {
        let resp = PaginatedResponse::<String>::new(vec![], 101, 1, 20);
        assert_eq!(resp.total_pages, 6);
    }

    #[test]
    fn total_pages_exact_division() {
        let resp = PaginatedResponse::<String>::new(vec![], 60, 1, 20);
        assert_eq!(resp.total_pages, 3);
    }

    #[test]
    fn total_pages_zero_per_page() {
        let resp = PaginatedResponse::<String>::new(vec![], 10, 1, 0);
        assert_eq!(resp.total_pages, 0);
    }

    #[test]
    fn total_pages_zero_total() {
        let resp = PaginatedResponse::<String>::new(vec![], 0, 1, 20);
        assert_eq!(resp.total_pages, 0);
    }

    #[test]
    fn resolve_defaults() {
        assert_eq!(PaginationQuery::default().resolve(), (1, DEFAULT_PER_PAGE));
    }

    #[test]
    fn resolve_clamps_out_of_range_values() {
        let q = PaginationQuery {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(q.resolve(), (1, MAX_PER_PAGE));

        let q = PaginationQuery {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(q.resolve(), (3, 1));
    }

    #[test]
    fn resolve_caps_page_so_offset_fits() {
        let q = PaginationQuery {
            page: Some(u64::MAX),
            per_page: Some(MAX_PER_PAGE),
        };
        let (page, per_page) = q.resolve();
        assert_eq!(page, MAX_PAGE);
        let offset = (page - 1).checked_mul(per_page).unwrap();
        assert!(offset <= i64::MAX as u64);
    }

    #[test]
    fn page_index_rejects_overflowing_offsets() {
        assert_eq!(page_index(1, 20).unwrap(), 0);
        assert_eq!(page_index(3, 20).unwrap(), 2);
        assert_eq!(page_index(0, 20).unwrap(), 0);
        assert!(page_index(u64::MAX, 100).is_err());
        assert!(page_index(MAX_PAGE, MAX_PER_PAGE).is_ok());
    }

    #[test]
    fn total_pages_single_item() {
        let resp = PaginatedResponse::<String>::new(vec![], 1, 1, 20);
        assert_eq!(resp.total_pages, 1);
    }
}
