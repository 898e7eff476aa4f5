//! Client-side pagination accounting.

use serde::{Deserialize, Serialize};

/// Tracks where an accumulating list fetch stands.
///
/// `page` is the next page to request (1-based). After page N loads, more
/// pages exist iff `N * limit < total`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageState {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl PageState {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            total: 0,
            // Nothing loaded yet, so the first load must be allowed through.
            has_more: true,
        }
    }

    /// Record a successfully loaded page: update `total`, advance to the
    /// next page, and recompute `has_more`.
    pub fn record_page(&mut self, total: u64) {
        let loaded = self.page;
        self.total = total;
        self.page = self.page.saturating_add(1);
        self.has_more = u64::from(loaded) * u64::from(self.limit) < total;
    }

    /// Back to page 1 with nothing loaded, keeping the configured limit.
    pub fn reset(&mut self) {
        *self = Self::new(self.limit);
    }
}
