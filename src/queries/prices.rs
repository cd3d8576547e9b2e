//! Price history queries against the local `price_observations` table.

use chrono::NaiveDate;

use crate::connection::Connection;
use crate::error::{MarketError, Result};
use crate::models::{ComparisonOutcome, PriceObservation, PriceSeries, PriceStats};
use crate::sql_builder::SqlBuilder;
use crate::trend;

const OBSERVATION_COLUMNS: &[&str] = &[
    "CAST(date AS VARCHAR) AS date",
    "CAST(price AS VARCHAR) AS price",
];

// ---------------------------------------------------------------------------
// PriceQuery
// ---------------------------------------------------------------------------

/// Query interface for per-product price observations.
pub struct PriceQuery<'a> {
    conn: &'a Connection,
}

impl<'a> PriceQuery<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Price history of a product in insertion order, optionally limited to
    /// an inclusive date range.
    pub fn history(
        &self,
        product_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<PriceSeries> {
        self.conn.ensure_tables(&["price_observations"])?;

        let mut qb = SqlBuilder::new("price_observations");
        qb.select(OBSERVATION_COLUMNS);
        qb.where_eq("product_id", product_id);
        if let Some(from) = from {
            qb.where_date_gte("date", &from.to_string());
        }
        if let Some(to) = to {
            qb.where_date_lte("date", &to.to_string());
        }
        qb.order_by(&["seq ASC"]);

        let (sql, params) = qb.build();
        let observations: Vec<PriceObservation> = self.conn.execute_into(&sql, &params)?;
        Ok(PriceSeries::from(observations))
    }

    /// Observations dated on or after `anchor`, ascending by date.
    ///
    /// Same-day observations keep their recording order. Fails with
    /// [`MarketError::NoDataForDate`] when nothing qualifies.
    pub fn compare(&self, product_id: &str, anchor: NaiveDate) -> Result<Vec<PriceObservation>> {
        self.conn.ensure_tables(&["price_observations"])?;

        let (sql, params) = SqlBuilder::new("price_observations")
            .select(OBSERVATION_COLUMNS)
            .where_eq("product_id", product_id)
            .where_date_gte("date", &anchor.to_string())
            .order_by(&["date ASC", "seq ASC"])
            .build();

        let slice: Vec<PriceObservation> = self.conn.execute_into(&sql, &params)?;
        if slice.is_empty() {
            return Err(MarketError::NoDataForDate {
                product_id: product_id.to_string(),
                anchor,
            });
        }
        Ok(slice)
    }

    /// Trend summary starting at `anchor`.
    pub fn compare_at(&self, product_id: &str, anchor: NaiveDate) -> Result<ComparisonOutcome> {
        let series = self.history(product_id, None, None)?;
        trend::compare_at(product_id, &series, anchor)
    }

    /// Min/max/average over the product's full history, or `None` when it
    /// has no observations.
    pub fn price_stats(&self, product_id: &str) -> Result<Option<PriceStats>> {
        let series = self.history(product_id, None, None)?;
        Ok(trend::price_stats(&series))
    }

    /// Number of observations recorded for a product.
    pub fn count(&self, product_id: &str) -> Result<u64> {
        self.conn.ensure_tables(&["price_observations"])?;
        let (sql, params) = SqlBuilder::new("price_observations")
            .where_eq("product_id", product_id)
            .build_count();
        let total = self.conn.execute_scalar(&sql, &params)?;
        Ok(total.and_then(|v| v.as_u64()).unwrap_or(0))
    }
}
