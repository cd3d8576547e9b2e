//! Collaborator contracts consumed by the catalog and comparison views.
//!
//! Implemented by the HTTP client ([`HttpMarketClient`](crate::http::HttpMarketClient))
//! and, with the `local-store` feature, by the DuckDB-backed
//! [`AsyncLocalMarket`](crate::AsyncLocalMarket).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{CatalogFilter, CatalogResponse, PriceObservation, Product};

/// Server-side filtered, sorted and paginated catalog search.
///
/// Implementations must be idempotent and safe to retry.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch page `page` (1-based) of products matching `filter`, along with
    /// the total number of matches.
    async fn query(&self, filter: &CatalogFilter, page: u32, page_size: u32)
        -> Result<CatalogResponse>;
}

#[async_trait]
pub trait ProductService: Send + Sync {
    /// Fetch a product with its full price history.
    ///
    /// Fails with [`MarketError::NotFound`](crate::MarketError::NotFound)
    /// for unknown ids.
    async fn fetch_by_id(&self, id: &str) -> Result<Product>;

    /// Observations dated on or after `anchor`, ascending.
    ///
    /// Fails with [`MarketError::NoDataForDate`](crate::MarketError::NoDataForDate)
    /// when there are none.
    async fn compare(&self, id: &str, anchor: NaiveDate) -> Result<Vec<PriceObservation>>;
}
