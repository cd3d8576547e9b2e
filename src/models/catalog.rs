use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::product::Product;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "pricePerUnit")]
    PricePerUnit,
}

impl SortField {
    /// Wire name, as used in query strings and sort keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::PricePerUnit => "pricePerUnit",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

// ---------------------------------------------------------------------------
// CatalogFilter: Validated filter, sort and search text
// ---------------------------------------------------------------------------

/// Inclusive creation-date bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// A normalized catalog query.
///
/// Only [`CatalogQuery`](crate::catalog_query::CatalogQuery) produces these
/// from user input, so `search_text` is already trimmed and the date range
/// is ordered. The default value means "no filtering, newest first".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub date_range: DateRange,
    pub search_text: String,
}

/// Raw, unvalidated catalog input as typed or picked by a user.
///
/// Empty or whitespace-only strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogInput {
    pub search_text: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
}

// ---------------------------------------------------------------------------
// CatalogResponse / Page
// ---------------------------------------------------------------------------

/// One page of results as returned by a catalog service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub items: Vec<Product>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
    pub page_size: u32,
    pub items: Vec<Product>,
    pub total_count: u64,
}

impl Page {
    /// `ceil(total_count / page_size)`; zero for an empty result set.
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }
}

pub(crate) fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
