//! Async wrapper around [`LocalMarket`] for use in Tokio runtimes.
//!
//! Runs all store operations on the blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free.
//! It implements [`CatalogService`] and [`ProductService`], so a
//! [`CatalogView`](crate::CatalogView) or
//! [`ComparisonSession`](crate::ComparisonSession) can run fully offline.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use localmarket_sdk::{AsyncLocalMarket, CatalogView};
//!
//! #[tokio::main]
//! async fn main() {
//!     let market = AsyncLocalMarket::builder().offline(true).build().await.unwrap();
//!
//!     let view = CatalogView::new(Arc::new(market.clone()));
//!     view.refresh().await;
//!
//!     let rows = market.sql("SELECT COUNT(*) AS n FROM products", &[]).await.unwrap();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::connection::Row;
use crate::error::{MarketError, Result};
use crate::models::{CatalogFilter, CatalogResponse, PriceObservation, Product};
use crate::service::{CatalogService, ProductService};
use crate::LocalMarket;

// ---------------------------------------------------------------------------
// AsyncLocalMarketBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`AsyncLocalMarket`].
pub struct AsyncLocalMarketBuilder {
    cache_dir: Option<PathBuf>,
    offline: bool,
    timeout: Duration,
    seed_from_snapshot: bool,
}

impl Default for AsyncLocalMarketBuilder {
    fn default() -> Self {
        Self {
            cache_dir: None,
            offline: false,
            timeout: Duration::from_secs(120),
            seed_from_snapshot: true,
        }
    }
}

impl AsyncLocalMarketBuilder {
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn seed_from_snapshot(mut self, seed: bool) -> Self {
        self.seed_from_snapshot = seed;
        self
    }

    /// Build the store on the blocking thread pool.
    pub async fn build(self) -> Result<AsyncLocalMarket> {
        tokio::task::spawn_blocking(move || {
            let mut builder = LocalMarket::builder();
            if let Some(dir) = self.cache_dir {
                builder = builder.cache_dir(dir);
            }
            let market = builder
                .offline(self.offline)
                .timeout(self.timeout)
                .seed_from_snapshot(self.seed_from_snapshot)
                .build()?;
            Ok(AsyncLocalMarket::from_market(market))
        })
        .await
        .map_err(|e| MarketError::InvalidArgument(format!("Task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// AsyncLocalMarket
// ---------------------------------------------------------------------------

/// Async wrapper around [`LocalMarket`].
///
/// The store uses `RefCell` internally, so it sits behind a [`Mutex`] and
/// every operation runs on a blocking thread. Clones share the same store.
#[derive(Clone)]
pub struct AsyncLocalMarket {
    inner: Arc<Mutex<LocalMarket>>,
}

impl AsyncLocalMarket {
    pub fn builder() -> AsyncLocalMarketBuilder {
        AsyncLocalMarketBuilder::default()
    }

    /// Wrap an already constructed store.
    pub fn from_market(market: LocalMarket) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    /// Run a sync store operation on the blocking thread pool.
    ///
    /// ```no_run
    /// # use localmarket_sdk::AsyncLocalMarket;
    /// # async fn example(market: AsyncLocalMarket) -> localmarket_sdk::Result<()> {
    /// let stats = market.run(|m| m.prices().price_stats("p-001")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&LocalMarket) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let market = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = market
                .lock()
                .map_err(|_| MarketError::InvalidArgument("store lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| MarketError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Execute a raw SQL query asynchronously.
    pub async fn sql(
        &self,
        query: &str,
        params: &[String],
    ) -> Result<Vec<Row>> {
        let query = query.to_string();
        let params = params.to_vec();
        self.run(move |m| m.sql(&query, &params)).await
    }

    /// Append a price observation; see
    /// [`ProductQuery::append_price`](crate::queries::ProductQuery::append_price).
    pub async fn append_price(&self, id: &str, observation: PriceObservation) -> Result<Product> {
        let id = id.to_string();
        self.run(move |m| m.products().append_price(&id, observation))
            .await
    }

    /// Check for a newer snapshot and reset local data if stale.
    pub async fn refresh(&self) -> Result<bool> {
        self.run(|m| m.refresh()).await
    }
}

#[async_trait]
impl CatalogService for AsyncLocalMarket {
    async fn query(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
    ) -> Result<CatalogResponse> {
        let filter = filter.clone();
        self.run(move |m| m.products().search(&filter, page, page_size))
            .await
    }
}

#[async_trait]
impl ProductService for AsyncLocalMarket {
    async fn fetch_by_id(&self, id: &str) -> Result<Product> {
        let id = id.to_string();
        self.run(move |m| {
            m.products()
                .get(&id)?
                .ok_or_else(|| MarketError::NotFound(format!("product {id}")))
        })
        .await
    }

    async fn compare(&self, id: &str, anchor: NaiveDate) -> Result<Vec<PriceObservation>> {
        let id = id.to_string();
        self.run(move |m| m.prices().compare(&id, anchor)).await
    }
}
