//! Product catalog queries against the local `products` table.

use serde_json::Value;

use crate::connection::Connection;
use crate::error::{MarketError, Result};
use crate::models::{
    CatalogFilter, CatalogResponse, PriceObservation, Product, SortField, SortOrder,
};
use crate::queries::prices::PriceQuery;
use crate::sql_builder::SqlBuilder;

/// Columns selected for a [`Product`] row.
///
/// Decimals and timestamps are rendered as text so they deserialize exactly.
const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "unit",
    "image_url AS \"imageUrl\"",
    "vendor_id AS \"vendorId\"",
    "vendor_name AS \"vendorName\"",
    "market_id AS \"marketId\"",
    "market_name AS \"marketName\"",
    "status",
    "CAST(price_per_unit AS VARCHAR) AS \"pricePerUnit\"",
    "strftime(created_at, '%Y-%m-%dT%H:%M:%S.%fZ') AS \"createdAt\"",
];

/// Columns searched by catalog text queries.
const SEARCH_COLUMNS: &[&str] = &["name", "market_name"];

const TABLES: &[&str] = &["products", "price_observations"];

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::PricePerUnit => "price_per_unit",
    }
}

fn sort_direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

// ---------------------------------------------------------------------------
// ProductQuery
// ---------------------------------------------------------------------------

/// Query interface for marketplace products.
pub struct ProductQuery<'a> {
    conn: &'a Connection,
}

impl<'a> ProductQuery<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn filtered(&self, filter: &CatalogFilter) -> SqlBuilder {
        let mut qb = SqlBuilder::new("products");
        qb.select(PRODUCT_COLUMNS);

        if !filter.search_text.is_empty() {
            qb.where_contains(SEARCH_COLUMNS, &filter.search_text);
        }
        if let Some(start) = filter.date_range.start {
            qb.where_date_gte("CAST(created_at AS DATE)", &start.to_string());
        }
        if let Some(end) = filter.date_range.end {
            qb.where_date_lte("CAST(created_at AS DATE)", &end.to_string());
        }
        qb
    }

    /// One page (1-based) of products matching `filter`, plus the total
    /// match count.
    ///
    /// Items carry no price history; use [`get`](Self::get) for that.
    /// Rows with equal sort keys are ordered by `id`.
    pub fn search(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
    ) -> Result<CatalogResponse> {
        if page == 0 || page_size == 0 {
            return Err(MarketError::InvalidArgument(format!(
                "page and page size must be at least 1 (page={page}, page_size={page_size})"
            )));
        }
        self.conn.ensure_tables(TABLES)?;

        let mut qb = self.filtered(filter);
        let order = format!(
            "{} {}",
            sort_column(filter.sort_field),
            sort_direction(filter.sort_order)
        );
        qb.order_by(&[&order, "id ASC"]);
        qb.limit(u64::from(page_size));
        qb.offset(u64::from(page - 1) * u64::from(page_size));

        let (sql, params) = qb.build();
        let items: Vec<Product> = self.conn.execute_into(&sql, &params)?;
        let total = self.count(filter)?;
        tracing::debug!(total, page, returned = items.len(), "catalog search");
        Ok(CatalogResponse { items, total })
    }

    /// Number of products matching `filter`.
    pub fn count(&self, filter: &CatalogFilter) -> Result<u64> {
        self.conn.ensure_tables(TABLES)?;
        let (sql, params) = self.filtered(filter).build_count();
        let total = self.conn.execute_scalar(&sql, &params)?;
        Ok(total.and_then(|v| v.as_u64()).unwrap_or(0))
    }

    /// Get a product with its full price history, in insertion order.
    pub fn get(&self, id: &str) -> Result<Option<Product>> {
        self.conn.ensure_tables(TABLES)?;
        let (sql, params) = SqlBuilder::new("products")
            .select(PRODUCT_COLUMNS)
            .where_eq("id", id)
            .limit(1)
            .build();

        let Some(mut product) = self
            .conn
            .execute_into::<Product>(&sql, &params)?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        product.price_history = PriceQuery::new(self.conn).history(id, None, None)?;
        Ok(Some(product))
    }

    /// Insert a new product together with its price history.
    ///
    /// The history must be non-empty and `price_per_unit` must equal the
    /// last recorded observation.
    pub fn create(&self, product: &Product) -> Result<()> {
        let Some(last) = product.price_history.last_recorded() else {
            return Err(MarketError::Validation(format!(
                "product {} has no price observations",
                product.id
            )));
        };
        if last.price != product.price_per_unit {
            return Err(MarketError::Validation(format!(
                "product {} price per unit {} does not match its latest observation {}",
                product.id, product.price_per_unit, last.price
            )));
        }
        self.conn.ensure_tables(TABLES)?;

        self.conn.transaction(|conn| {
            let mut params: Vec<String> = vec![
                product.id.clone(),
                product.name.clone(),
                product.unit.clone(),
                product.vendor_id.clone(),
                product.vendor_name.clone(),
                product.market_id.clone(),
                product.market_name.clone(),
                product.status.as_str().to_string(),
                product.price_per_unit.to_string(),
                // Microseconds, the precision of a DuckDB TIMESTAMP.
                product.created_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            ];
            let description = nullable(&product.description, &mut params);
            let image_url = nullable(&product.image_url, &mut params);
            let sql = format!(
                "INSERT INTO products (id, name, unit, vendor_id, vendor_name, market_id, \
                 market_name, status, price_per_unit, created_at, description, image_url) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(18, 4)), \
                 CAST(? AS TIMESTAMP), {description}, {image_url})"
            );
            conn.execute_write(&sql, &params)?;

            for (seq, obs) in product.price_history.as_recorded().iter().enumerate() {
                insert_observation(conn, &product.id, seq as u64 + 1, obs)?;
            }
            Ok(())
        })?;
        tracing::debug!(id = %product.id, "created product");
        Ok(())
    }

    /// Append a price observation and make it the product's current price.
    ///
    /// Both writes happen in one transaction. Back-dated observations still
    /// become the current price.
    pub fn append_price(&self, id: &str, observation: PriceObservation) -> Result<Product> {
        self.conn.ensure_tables(TABLES)?;
        self.conn.transaction(|conn| {
            let next = conn.execute_scalar(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM price_observations WHERE product_id = ?",
                &[id.to_string()],
            )?;
            let seq = next.and_then(|v| v.as_u64()).unwrap_or(1);

            let updated = conn.execute_write(
                "UPDATE products SET price_per_unit = CAST(? AS DECIMAL(18, 4)) WHERE id = ?",
                &[observation.price.to_string(), id.to_string()],
            )?;
            if updated == 0 {
                return Err(MarketError::NotFound(format!("product {id}")));
            }
            insert_observation(conn, id, seq, &observation)
        })?;
        tracing::debug!(id, date = %observation.date, price = %observation.price, "appended price");

        self.get(id)?
            .ok_or_else(|| MarketError::NotFound(format!("product {id}")))
    }

    /// Cheapest approved products in one market, optionally narrowed by text.
    pub fn cheapest_in_market(
        &self,
        market_id: &str,
        search_text: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Product>> {
        self.conn.ensure_tables(TABLES)?;

        let mut qb = SqlBuilder::new("products");
        qb.select(PRODUCT_COLUMNS);
        qb.where_eq("market_id", market_id);
        qb.where_eq("status", "approved");
        if let Some(text) = search_text.map(str::trim).filter(|t| !t.is_empty()) {
            qb.where_contains(&["name"], text);
        }
        qb.order_by(&["price_per_unit ASC", "id ASC"]);
        qb.limit(limit);

        let (sql, params) = qb.build();
        self.conn.execute_into(&sql, &params)
    }

    /// Distinct markets present in the catalog as `(market_id, market_name)`.
    pub fn markets(&self) -> Result<Vec<(String, String)>> {
        self.conn.ensure_tables(TABLES)?;
        let rows = self.conn.execute(
            "SELECT DISTINCT market_id, market_name FROM products ORDER BY market_name, market_id",
            &[],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("market_id").and_then(Value::as_str)?.to_string();
                let name = row.get("market_name").and_then(Value::as_str)?.to_string();
                Some((id, name))
            })
            .collect())
    }
}

/// Push a bound value for `Some`, or return a literal `NULL` placeholder.
fn nullable(value: &Option<String>, params: &mut Vec<String>) -> &'static str {
    match value {
        Some(v) => {
            params.push(v.clone());
            "?"
        }
        None => "NULL",
    }
}

fn insert_observation(
    conn: &Connection,
    product_id: &str,
    seq: u64,
    observation: &PriceObservation,
) -> Result<()> {
    conn.execute_write(
        "INSERT INTO price_observations (product_id, seq, date, price) \
         VALUES (?, CAST(? AS BIGINT), CAST(? AS DATE), CAST(? AS DECIMAL(18, 4)))",
        &[
            product_id.to_string(),
            seq.to_string(),
            observation.date.to_string(),
            observation.price.to_string(),
        ],
    )?;
    Ok(())
}
