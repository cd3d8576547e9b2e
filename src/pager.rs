//! Page bookkeeping for catalog results.

use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::catalog::total_pages;
use crate::models::{Page, Product};

/// Tracks the current page and total result count of a catalog listing.
///
/// Keeps `1 <= page_number <= max(total_pages, 1)` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPager {
    page_number: u32,
    page_size: u32,
    total_count: u64,
}

impl Default for CatalogPager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CatalogPager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            total_count: 0,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Zero when there are no results.
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    /// Page count for display: an empty listing still shows "1 of 1".
    pub fn display_total_pages(&self) -> u32 {
        self.total_pages().max(1)
    }

    pub fn is_last_page(&self) -> bool {
        self.page_number >= self.display_total_pages()
    }

    /// Advance one page. Returns `false` (and does nothing) on the last page.
    pub fn go_to_next_page(&mut self) -> bool {
        if self.is_last_page() {
            return false;
        }
        self.page_number += 1;
        true
    }

    /// Go back one page. Returns `false` (and does nothing) on page 1.
    pub fn go_to_previous_page(&mut self) -> bool {
        if self.page_number <= 1 {
            return false;
        }
        self.page_number -= 1;
        true
    }

    /// Must run on every filter change, before the next fetch is issued.
    pub fn reset_to_first_page(&mut self) {
        self.page_number = 1;
    }

    /// Record the total reported by the latest applied response.
    ///
    /// Clamps the current page if the result set shrank below it.
    pub fn set_total_count(&mut self, total_count: u64) {
        self.total_count = total_count;
        self.page_number = self.page_number.clamp(1, self.display_total_pages());
    }

    /// Package `items` as the current page.
    pub fn page(&self, items: Vec<Product>) -> Page {
        Page {
            page_number: self.page_number,
            page_size: self.page_size,
            items,
            total_count: self.total_count,
        }
    }
}
