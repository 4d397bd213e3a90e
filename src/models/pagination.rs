//! Pagination types

use serde::{Deserialize, Serialize};

/// Page request, 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Out-of-range values are clamped: page to at least 1, per_page to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Row offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// One page of results plus the numbers a pager needs.
///
/// `from`/`to` are the 1-based positions of the first and last item on the
/// page, absent when the page is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl<T> PagedResult<T> {
    pub fn new(data: Vec<T>, total: i64, params: &ListParams) -> Self {
        let per_page = params.per_page.max(1);
        let last_page = ((total.max(0) + per_page as i64 - 1) / per_page as i64).max(1);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = params.offset() + 1;
            (Some(from), Some(from + data.len() as i64 - 1))
        };

        Self {
            data,
            current_page: params.page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            per_page,
            total,
            from,
            to,
        }
    }
}
