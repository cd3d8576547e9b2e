//! Product-detail price comparison.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{MarketError, Result};
use crate::fetch::{CancellableFetchController, PendingFetch, ViewError, ViewErrorKind};
use crate::models::{ComparisonOutcome, PriceStats, Product, Trend};
use crate::service::ProductService;
use crate::trend;

/// A product with the price figures shown on its detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub product: Product,
    pub latest_price: Decimal,
    /// Change between the two chronologically last observations.
    /// `None` while the product has a single observation.
    pub recent_trend: Option<Trend>,
    pub stats: Option<PriceStats>,
}

impl ProductSummary {
    pub fn from_product(product: Product) -> Result<Self> {
        let latest_price = trend::latest_price(&product.price_history)?;
        let sorted = product.price_history.chronological();
        let recent_trend = match sorted.as_slice() {
            [.., previous, current] => Some(trend::trend(previous.price, current.price)),
            _ => None,
        };
        let stats = trend::price_stats(&product.price_history);
        Ok(Self {
            product,
            latest_price,
            recent_trend,
            stats,
        })
    }
}

/// Comparison state as rendered on the detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonState {
    pub anchor: Option<NaiveDate>,
    pub comparison: Option<ComparisonOutcome>,
    pub is_loading: bool,
    pub error: Option<ViewError>,
}

/// Price comparison for one product, recomputed on every date selection.
///
/// At most one comparison is applied at a time: picking a new date
/// supersedes whatever request is still in flight.
///
/// Requests start on their own Tokio task as soon as they are issued;
/// awaiting the returned [`PendingFetch`] is optional.
pub struct ComparisonSession {
    product_id: String,
    service: Arc<dyn ProductService>,
    anchor: Mutex<Option<NaiveDate>>,
    comparison: CancellableFetchController<ComparisonOutcome>,
    product: CancellableFetchController<ProductSummary>,
}

impl ComparisonSession {
    pub fn new(product_id: impl Into<String>, service: Arc<dyn ProductService>) -> Self {
        Self {
            product_id: product_id.into(),
            service,
            anchor: Mutex::new(None),
            comparison: CancellableFetchController::new(),
            product: CancellableFetchController::new(),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Load the product and its headline price figures.
    pub fn load_product(&self) -> PendingFetch {
        let service = Arc::clone(&self.service);
        let id = self.product_id.clone();
        self.product.issue(async move {
            let product = service.fetch_by_id(&id).await?;
            ProductSummary::from_product(product)
        })
    }

    /// Compare prices starting at `anchor`.
    ///
    /// The trend runs from the first to the second observation on or after
    /// the anchor. A single observation yields "insufficient data"; none at
    /// all yields a `NoData` error, distinct from a failed request.
    pub fn select_date(&self, anchor: NaiveDate) -> PendingFetch {
        *self.anchor.lock().unwrap_or_else(PoisonError::into_inner) = Some(anchor);

        let service = Arc::clone(&self.service);
        let id = self.product_id.clone();
        self.comparison.issue(async move {
            let mut slice = service.compare(&id, anchor).await?;
            slice.retain(|o| o.date >= anchor);
            slice.sort_by_key(|o| o.date);
            if slice.is_empty() {
                return Err(MarketError::NoDataForDate {
                    product_id: id,
                    anchor,
                });
            }
            Ok(trend::summarize_slice(slice))
        })
    }

    pub fn state(&self) -> ComparisonState {
        let snapshot = self.comparison.snapshot();
        // A stale comparison must not sit next to a "no data" message.
        let no_data = snapshot
            .error
            .as_ref()
            .map(|e| e.kind == ViewErrorKind::NoData)
            .unwrap_or(false);
        ComparisonState {
            anchor: *self.anchor.lock().unwrap_or_else(PoisonError::into_inner),
            comparison: if no_data { None } else { snapshot.data },
            is_loading: snapshot.is_loading,
            error: snapshot.error,
        }
    }

    pub fn product_summary(&self) -> Option<ProductSummary> {
        self.product.snapshot().data
    }

    pub fn product_error(&self) -> Option<ViewError> {
        self.product.snapshot().error
    }

    /// Drop all pending results; used when the detail view closes.
    pub fn teardown(&self) {
        self.comparison.teardown();
        self.product.teardown();
    }
}
