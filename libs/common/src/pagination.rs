//! Page/limit pagination shared by every listing repository

use serde::Deserialize;

/// Default number of items per page
pub const DEFAULT_LIMIT: u32 = 10;
/// Upper bound on items per page
pub const MAX_LIMIT: u32 = 100;

/// Requested page of a listing (1-based)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Page number, never below 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=MAX_LIMIT`
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) as i64 * self.limit() as i64
    }
}
