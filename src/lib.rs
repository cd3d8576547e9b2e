//! Price history and comparison SDK for a local-goods marketplace.
//!
//! The crate has two halves:
//!
//! - View controllers ([`CatalogView`], [`ComparisonSession`]) that drive
//!   filtered, paginated and debounced catalog search and point-in-time
//!   price comparisons against any [`CatalogService`] / [`ProductService`].
//! - Service implementations: [`http::HttpMarketClient`] for the marketplace
//!   API and, with the default `local-store` feature, [`LocalMarket`], an
//!   in-process DuckDB mirror seeded from catalog snapshot exports.
//!
//! # Quick start
//!
//! ```no_run
//! use localmarket_sdk::{CatalogFilter, LocalMarket};
//!
//! let market = LocalMarket::builder().offline(true).build().unwrap();
//!
//! let page = market.products().search(&CatalogFilter::default(), 1, 32).unwrap();
//! for product in &page.items {
//!     println!("{} {} / {}", product.name, product.price_per_unit, product.unit);
//! }
//! ```

#[cfg(feature = "local-store")]
pub mod async_client;
#[cfg(feature = "local-store")]
pub mod cache;
pub mod catalog_query;
pub mod catalog_view;
pub mod comparison;
pub mod config;
#[cfg(feature = "local-store")]
pub mod connection;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod http;
pub mod models;
pub mod pager;
#[cfg(feature = "local-store")]
pub mod queries;
pub mod service;
pub mod sql_builder;
pub mod trend;

#[cfg(feature = "local-store")]
pub use async_client::AsyncLocalMarket;
#[cfg(feature = "local-store")]
pub use cache::SnapshotCache;
pub use catalog_query::CatalogQuery;
pub use catalog_view::{CatalogView, CatalogViewState};
pub use comparison::{ComparisonSession, ComparisonState, ProductSummary};
#[cfg(feature = "local-store")]
pub use connection::Connection;
pub use debounce::{CommittedSearches, DebouncedSearchController};
pub use error::{MarketError, Result};
pub use fetch::{CancellableFetchController, PendingFetch, Settled, ViewError, ViewErrorKind};
pub use models::{
    CatalogFilter, CatalogInput, CatalogResponse, ComparisonOutcome, ComparisonResult, DateRange,
    ModerationStatus, NewProduct, Page, PriceObservation, PriceSeries, PriceStats, Product,
    SortField, SortOrder, Trend, TrendDirection,
};
pub use pager::CatalogPager;
pub use service::{CatalogService, ProductService};
pub use sql_builder::SqlBuilder;

#[cfg(feature = "local-store")]
pub use local::{LocalMarket, LocalMarketBuilder};

#[cfg(feature = "local-store")]
mod local {
    use std::fmt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use crate::cache::SnapshotCache;
    use crate::connection::{Connection, Row};
    use crate::error::Result;
    use crate::queries;

    const TABLES: &[&str] = &["products", "price_observations"];

    // -----------------------------------------------------------------------
    // LocalMarketBuilder
    // -----------------------------------------------------------------------

    /// Builder for configuring and constructing a [`LocalMarket`].
    ///
    /// Use [`LocalMarket::builder()`] to obtain one.
    pub struct LocalMarketBuilder {
        cache_dir: Option<PathBuf>,
        offline: bool,
        timeout: Duration,
        snapshot_base: Option<String>,
        seed_from_snapshot: bool,
    }

    impl Default for LocalMarketBuilder {
        fn default() -> Self {
            Self {
                cache_dir: None,
                offline: false,
                timeout: Duration::from_secs(120),
                snapshot_base: None,
                seed_from_snapshot: true,
            }
        }
    }

    impl LocalMarketBuilder {
        /// Set a custom cache directory.
        ///
        /// If not set, the platform cache directory is used
        /// (e.g. `~/.cache/localmarket-sdk` on Linux).
        pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
            self.cache_dir = Some(path.as_ref().to_path_buf());
            self
        }

        /// Never download; only previously cached snapshots are used.
        /// Defaults to `false`.
        pub fn offline(mut self, offline: bool) -> Self {
            self.offline = offline;
            self
        }

        /// HTTP timeout for snapshot downloads. Defaults to 120 seconds.
        pub fn timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        /// Download snapshots from a mirror instead of the default export host.
        pub fn snapshot_base_url(mut self, url: impl Into<String>) -> Self {
            self.snapshot_base = Some(url.into());
            self
        }

        /// Whether the first query imports the cached catalog snapshot.
        ///
        /// With `false` the store starts empty and is filled through
        /// [`ProductQuery::create`](crate::queries::ProductQuery::create) or
        /// [`LocalMarket::import_snapshot`]. Defaults to `true`.
        pub fn seed_from_snapshot(mut self, seed: bool) -> Self {
            self.seed_from_snapshot = seed;
            self
        }

        /// Build the store. No snapshot is downloaded until the first query.
        pub fn build(self) -> Result<LocalMarket> {
            let mut cache = SnapshotCache::new(self.cache_dir, self.offline, self.timeout)?;
            if let Some(base) = self.snapshot_base {
                cache = cache.with_base_url(base);
            }
            let conn = Connection::new(cache)?;
            if !self.seed_from_snapshot {
                conn.mark_loaded(TABLES);
            }
            Ok(LocalMarket { conn })
        }
    }

    // -----------------------------------------------------------------------
    // LocalMarket
    // -----------------------------------------------------------------------

    /// In-process catalog store backed by DuckDB.
    ///
    /// Wraps a [`Connection`] (which owns the [`SnapshotCache`]) and exposes
    /// query interfaces as lightweight borrowing wrappers.
    pub struct LocalMarket {
        conn: Connection,
    }

    impl LocalMarket {
        pub fn builder() -> LocalMarketBuilder {
            LocalMarketBuilder::default()
        }

        /// Wrap an existing connection, e.g. one seeded by hand.
        pub fn from_connection(conn: Connection) -> Self {
            Self { conn }
        }

        /// Product catalog queries and writes.
        pub fn products(&self) -> queries::ProductQuery<'_> {
            queries::ProductQuery::new(&self.conn)
        }

        /// Price history queries.
        pub fn prices(&self) -> queries::PriceQuery<'_> {
            queries::PriceQuery::new(&self.conn)
        }

        /// Import a catalog export file into `table`.
        ///
        /// `table` is one of `products` or `price_observations`; the file is
        /// newline-delimited JSON with snake_case keys, optionally gzipped.
        /// Returns the number of imported rows.
        pub fn import_snapshot<P: AsRef<Path>>(&self, table: &str, path: P) -> Result<usize> {
            let path = path.as_ref().to_string_lossy().to_string();
            self.conn.import_ndjson(table, &path)
        }

        /// Execute a raw SQL query against the local store.
        ///
        /// # Arguments
        ///
        /// * `query` - SQL string with `?` positional placeholders.
        /// * `params` - Parameter values corresponding to the placeholders.
        pub fn sql(
            &self,
            query: &str,
            params: &[String],
        ) -> Result<Vec<Row>> {
            self.conn.execute(query, params)
        }

        /// Check for a newer published snapshot and drop local data if stale.
        ///
        /// Returns `true` if the data was stale, meaning the next query will
        /// download and import the fresh export.
        pub fn refresh(&self) -> Result<bool> {
            let stale = self.conn.cache.borrow_mut().is_stale()?;
            if stale {
                self.conn.cache.borrow().clear()?;
                self.conn.reset_tables()?;
                tracing::info!("catalog snapshot was stale; cache cleared and tables reset");
            }
            Ok(stale)
        }

        /// Tables that currently hold data.
        pub fn loaded_tables(&self) -> Vec<String> {
            self.conn.loaded_tables()
        }

        pub fn connection(&self) -> &Connection {
            &self.conn
        }
    }

    impl fmt::Display for LocalMarket {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let tables = self.conn.loaded_tables();
            let cache = self.conn.cache.borrow();
            write!(
                f,
                "LocalMarket(cache_dir={}, tables=[{}], offline={})",
                cache.cache_dir.display(),
                tables.join(", "),
                cache.offline
            )
        }
    }
}
