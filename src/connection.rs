//! DuckDB connection wrapper with catalog schema, snapshot import and query execution.
//!
//! The local store mirrors the marketplace catalog in two tables:
//! - `products`: one row per listing, including the denormalized `price_per_unit`
//! - `price_observations`: append-only price history, ordered per product by `seq`

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use duckdb::types::ValueRef;
use duckdb::{Connection as DuckDbConnection, ToSql};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

use crate::cache::SnapshotCache;
use crate::config;
use crate::error::{MarketError, Result};

/// One result row keyed by column name.
pub type Row = HashMap<String, Json>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id VARCHAR PRIMARY KEY,
    name VARCHAR NOT NULL,
    description VARCHAR,
    unit VARCHAR NOT NULL,
    image_url VARCHAR,
    vendor_id VARCHAR NOT NULL,
    vendor_name VARCHAR NOT NULL,
    market_id VARCHAR NOT NULL,
    market_name VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    price_per_unit DECIMAL(18, 4) NOT NULL,
    created_at TIMESTAMP NOT NULL
);
CREATE TABLE IF NOT EXISTS price_observations (
    product_id VARCHAR NOT NULL,
    seq BIGINT NOT NULL,
    date DATE NOT NULL,
    price DECIMAL(18, 4) NOT NULL
);
";

/// Wraps a DuckDB connection holding the local catalog tables.
///
/// Tables are filled lazily from cached catalog snapshots on first access,
/// unless they were already populated by an import or a write.
pub struct Connection {
    conn: DuckDbConnection,
    /// The snapshot cache used to download/locate catalog exports.
    pub cache: RefCell<SnapshotCache>,
    loaded_tables: RefCell<HashSet<String>>,
}

impl Connection {
    /// Create a connection backed by the given cache.
    ///
    /// Opens an in-memory DuckDB database and creates the catalog tables.
    pub fn new(cache: SnapshotCache) -> Result<Self> {
        let conn = DuckDbConnection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            cache: RefCell::new(cache),
            loaded_tables: RefCell::new(HashSet::new()),
        })
    }

    /// Ensure one or more tables are populated, importing snapshots if needed.
    pub fn ensure_tables(&self, tables: &[&str]) -> Result<()> {
        for name in tables {
            if !self.loaded_tables.borrow().contains(*name) {
                self.load_snapshot_table(name)?;
            }
        }
        Ok(())
    }

    /// Treat the given tables as populated without importing anything.
    ///
    /// Used for stores that start empty and are filled through writes.
    pub fn mark_loaded(&self, tables: &[&str]) {
        let mut loaded = self.loaded_tables.borrow_mut();
        for name in tables {
            loaded.insert(name.to_string());
        }
    }

    /// Run a query and return every row as a column-name keyed map.
    pub fn execute(&self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind(params).as_slice())?;

        // Column names are known only after the statement has run.
        let columns: Vec<String> = rows
            .as_ref()
            .ok_or_else(|| MarketError::InvalidArgument("query returned no statement metadata".into()))?
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Run a query and deserialize each row into `T`.
    pub fn execute_into<T: DeserializeOwned>(&self, sql: &str, params: &[String]) -> Result<Vec<T>> {
        self.execute(sql, params)?
            .into_iter()
            .map(|row| {
                serde_json::from_value(Json::Object(row.into_iter().collect()))
                    .map_err(MarketError::from)
            })
            .collect()
    }

    /// First column of the first row, or `None` for an empty result.
    pub fn execute_scalar(&self, sql: &str, params: &[String]) -> Result<Option<Json>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind(params).as_slice())?;
        match rows.next()? {
            Some(row) => Ok(Some(to_json(row.get_ref(0)?))),
            None => Ok(None),
        }
    }

    /// Run a write statement, returning the number of affected rows.
    pub fn execute_write(&self, sql: &str, params: &[String]) -> Result<usize> {
        Ok(self.conn.execute(sql, bind(params).as_slice())?)
    }

    /// Run `f` inside a transaction, rolling back if it fails.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Append rows from a newline-delimited JSON file (optionally `.gz`) to
    /// a catalog table, matching columns by name.
    ///
    /// Data is streamed from disk by DuckDB rather than parsed in Rust.
    pub fn import_ndjson(&self, table_name: &str, ndjson_path: &str) -> Result<usize> {
        if !known_table(table_name) {
            return Err(MarketError::InvalidArgument(format!(
                "unknown catalog table: {}",
                table_name
            )));
        }
        let path_fwd = ndjson_path.replace('\\', "/").replace('\'', "''");
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO {} BY NAME \
                 SELECT * FROM read_json_auto('{}', format='newline_delimited')",
                table_name, path_fwd
            ),
            [],
        )?;
        self.loaded_tables.borrow_mut().insert(table_name.to_string());
        tracing::info!(table = table_name, rows = inserted, "imported catalog rows");
        Ok(inserted)
    }

    /// Check whether a table has been populated.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded_tables.borrow().contains(name)
    }

    /// Return a list of all populated table names.
    pub fn loaded_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.loaded_tables.borrow().iter().cloned().collect();
        tables.sort();
        tables
    }

    /// Empty every catalog table so the next access re-imports snapshots.
    pub fn reset_tables(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM price_observations; DELETE FROM products;")?;
        self.loaded_tables.borrow_mut().clear();
        Ok(())
    }

    /// Access the underlying DuckDB connection for advanced usage.
    pub fn raw(&self) -> &DuckDbConnection {
        &self.conn
    }

    fn load_snapshot_table(&self, table: &str) -> Result<()> {
        let path = self.cache.borrow_mut().ensure_snapshot(table)?;
        let path_str = path.to_string_lossy().to_string();
        self.import_ndjson(table, &path_str)?;
        Ok(())
    }
}

fn known_table(name: &str) -> bool {
    config::snapshot_files().iter().any(|(table, _)| *table == name)
}

fn bind(params: &[String]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

/// Dates, timestamps and decimals are not mapped here; queries cast them
/// to VARCHAR so they come back exactly as stored.
fn to_json(value: ValueRef<'_>) -> Json {
    match value {
        ValueRef::Boolean(b) => Json::Bool(b),
        ValueRef::TinyInt(n) => Json::from(n),
        ValueRef::SmallInt(n) => Json::from(n),
        ValueRef::Int(n) => Json::from(n),
        ValueRef::BigInt(n) => Json::from(n),
        ValueRef::UTinyInt(n) => Json::from(n),
        ValueRef::USmallInt(n) => Json::from(n),
        ValueRef::UInt(n) => Json::from(n),
        ValueRef::UBigInt(n) => Json::from(n),
        ValueRef::HugeInt(n) => i64::try_from(n)
            .map(Json::from)
            .unwrap_or_else(|_| Json::String(n.to_string())),
        ValueRef::Float(f) => Json::from(f as f64),
        ValueRef::Double(f) => Json::from(f),
        ValueRef::Text(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
        _ => Json::Null,
    }
}
