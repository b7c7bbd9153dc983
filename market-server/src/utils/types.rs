//! Shared Types
//!
//! Common types used across the application

use serde::{Deserialize, Serialize};

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    12
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Offset into the result set (page is 1-based).
    ///
    /// Computed in u64: page and limit are caller-supplied, and their
    /// product can exceed u32.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit())
    }

    /// Page size, clamped to a sane upper bound
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, 100)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let limit = params.limit() as u64;
        Self {
            items,
            total,
            total_pages: total.div_ceil(limit),
            current_page: params.page,
        }
    }
}
