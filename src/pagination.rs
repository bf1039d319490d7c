//! Limit/offset pagination for admin and partner list endpoints.

use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 25;
const MAX_LIMIT: i64 = 100;

/// Query parameters for paginated list endpoints.
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct PaginationQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of items plus the total across all pages.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, query: &PaginationQuery) -> Self {
        Self {
            items,
            total,
            limit: query.limit(),
            offset: query.offset(),
        }
    }
}
