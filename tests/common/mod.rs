//! Shared test fixtures for the localmarket SDK integration tests.
//!
//! Provides `setup_market()`, which creates an in-memory DuckDB store
//! populated from NDJSON temp files, plus small in-process services for
//! driving the view controllers.

#![allow(dead_code)]

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use localmarket_sdk::{
    CatalogFilter, CatalogResponse, CatalogService, LocalMarket, MarketError, PriceObservation,
    Product, ProductService, Result,
};
use rust_decimal::Decimal;
use tempfile::NamedTempFile;
use tokio::sync::oneshot;

/// Number of "Jasmine Rice" listings in the fixture.
pub const RICE_COUNT: usize = 40;

/// Every product in the fixture.
pub const PRODUCT_COUNT: usize = RICE_COUNT + 4;

/// Route SDK logs to the test harness; `RUST_LOG=localmarket_sdk=debug`
/// shows request tokens and snapshot imports.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn obs(d: &str, price: &str) -> PriceObservation {
    PriceObservation::new(date(d), dec(price)).unwrap()
}

/// Create a `LocalMarket` backed by a temporary cache directory with sample
/// data imported from NDJSON temp files.
///
/// Returns `(LocalMarket, tempfile::TempDir)`. The caller must keep the
/// `TempDir` alive for the duration of the test.
///
/// Fixture contents:
/// - `rice-00` .. `rice-39`: "Jasmine Rice NN" at Riverside Market, created
///   one day apart from 2024-01-01, priced 2.00, 2.25, 2.50, ... in order
/// - `honey`: Hillside Farmers Market, observations 10.00 (03-01),
///   11.00 (03-10), 12.50 (03-20)
/// - `eggs`: pending, observations 5.40 (03-25) then a back-dated 6.00 (03-20)
/// - `tomato`: single observation 3.00 (04-01)
/// - `rye`: "100% Rye Bread", single observation 4.75 (04-02)
pub fn setup_market() -> (LocalMarket, tempfile::TempDir) {
    init_tracing();
    let tmp_dir = tempfile::tempdir().unwrap();
    let market = LocalMarket::builder()
        .cache_dir(tmp_dir.path())
        .offline(true)
        .seed_from_snapshot(false)
        .build()
        .unwrap();

    let (products, observations) = sample_rows();
    write_ndjson_and_import(&market, "products", &products);
    write_ndjson_and_import(&market, "price_observations", &observations);

    (market, tmp_dir)
}

/// `rice-NN` price for index `n`: 2.00 + 0.25 * n.
pub fn rice_price(n: usize) -> Decimal {
    dec("2.00") + dec("0.25") * Decimal::from(n)
}

fn sample_rows() -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
    let mut products = Vec::new();
    let mut observations = Vec::new();
    let day_zero = date("2024-01-01");

    for n in 0..RICE_COUNT {
        let created = day_zero + Duration::days(n as i64);
        let id = format!("rice-{:02}", n);
        let price = rice_price(n).to_string();
        products.push(serde_json::json!({
            "id": id,
            "name": format!("Jasmine Rice {:02}", n),
            "description": null,
            "unit": "kg",
            "image_url": null,
            "vendor_id": "v-paddy",
            "vendor_name": "Paddy Fields Co-op",
            "market_id": "m-riverside",
            "market_name": "Riverside Market",
            "status": "approved",
            "price_per_unit": price,
            "created_at": format!("{} 08:00:00", created),
        }));
        observations.push(serde_json::json!({
            "product_id": id,
            "seq": 1,
            "date": created.to_string(),
            "price": price,
        }));
    }

    let others = [
        ("honey", "Wildflower Honey", "jar", "m-hillside", "Hillside Farmers Market", "approved", "12.50", "2024-03-01 09:30:00"),
        ("eggs", "Free-range Eggs", "dozen", "m-hillside", "Hillside Farmers Market", "pending", "6.00", "2024-03-20 07:15:00"),
        ("tomato", "Heirloom Tomatoes", "kg", "m-riverside", "Riverside Market", "approved", "3.00", "2024-04-01 10:00:00"),
        ("rye", "100% Rye Bread", "loaf", "m-riverside", "Riverside Market", "approved", "4.75", "2024-04-02 06:45:00"),
    ];
    for (id, name, unit, market_id, market_name, status, price, created) in others {
        products.push(serde_json::json!({
            "id": id,
            "name": name,
            "description": format!("{} from local growers", name),
            "unit": unit,
            "image_url": format!("https://img.localmarket.example/{}.jpg", id),
            "vendor_id": format!("v-{}", id),
            "vendor_name": format!("{} Vendor", name),
            "market_id": market_id,
            "market_name": market_name,
            "status": status,
            "price_per_unit": price,
            "created_at": created,
        }));
    }

    let history = [
        ("honey", 1, "2024-03-01", "10.00"),
        ("honey", 2, "2024-03-10", "11.00"),
        ("honey", 3, "2024-03-20", "12.50"),
        ("eggs", 1, "2024-03-25", "5.40"),
        ("eggs", 2, "2024-03-20", "6.00"),
        ("tomato", 1, "2024-04-01", "3.00"),
        ("rye", 1, "2024-04-02", "4.75"),
    ];
    for (id, seq, d, price) in history {
        observations.push(serde_json::json!({
            "product_id": id,
            "seq": seq,
            "date": d,
            "price": price,
        }));
    }

    (products, observations)
}

/// Write a slice of JSON values as NDJSON to a temp file and import it into
/// the given table.
pub fn write_ndjson_and_import(market: &LocalMarket, table: &str, rows: &[serde_json::Value]) {
    let mut file = NamedTempFile::new().unwrap();
    for row in rows {
        writeln!(file, "{}", serde_json::to_string(row).unwrap()).unwrap();
    }
    file.flush().unwrap();

    // DuckDB copies the rows into its own table, so the temp file may go.
    market.import_snapshot(table, file.path()).unwrap();
}

/// A product built in memory, for service fakes.
pub fn product(id: &str, name: &str, history: &[(&str, &str)]) -> Product {
    let mut series = history.iter().map(|(d, p)| obs(d, p));
    let first = series.next().unwrap();
    let mut product = Product::new(
        localmarket_sdk::NewProduct {
            id: id.to_string(),
            name: name.to_string(),
            unit: "kg".to_string(),
            vendor_id: "v-1".to_string(),
            vendor_name: "Vendor One".to_string(),
            market_id: "m-1".to_string(),
            market_name: "Market One".to_string(),
            ..Default::default()
        },
        first,
        chrono::DateTime::parse_from_rfc3339("2024-01-01T08:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
    );
    for o in series {
        product.record_price(o);
    }
    product
}

// ---------------------------------------------------------------------------
// Catalog service fakes
// ---------------------------------------------------------------------------

/// Answers immediately from an in-memory list, matching `search_text`
/// against product names. Records every call.
pub struct MemoryCatalog {
    products: Vec<Product>,
    pub calls: Mutex<Vec<(CatalogFilter, u32)>>,
    pub fail: AtomicBool,
}

impl MemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// `count` products named "Item NN".
    pub fn with_items(count: usize) -> Self {
        let products = (0..count)
            .map(|n| product(&format!("item-{:02}", n), &format!("Item {:02}", n), &[("2024-01-01", "1.00")]))
            .collect();
        Self::new(products)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(CatalogFilter, u32)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CatalogService for MemoryCatalog {
    async fn query(&self, filter: &CatalogFilter, page: u32, page_size: u32) -> Result<CatalogResponse> {
        self.calls.lock().unwrap().push((filter.clone(), page));
        if self.fail.load(Ordering::SeqCst) {
            return Err(MarketError::Network("connection reset".into()));
        }
        let needle = filter.search_text.to_lowercase();
        let matching: Vec<Product> = self
            .products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .collect();
        Ok(CatalogResponse { items, total })
    }
}

type Gate<T> = oneshot::Sender<Result<T>>;

/// Holds every call open until the test resolves it.
#[derive(Default)]
pub struct GatedCatalog {
    pending: Mutex<Vec<(CatalogFilter, u32, Option<Gate<CatalogResponse>>)>>,
    issued: AtomicUsize,
}

impl GatedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Resolve the `index`-th call (0-based, in arrival order).
    pub fn resolve(&self, index: usize, result: Result<CatalogResponse>) {
        let gate = self.pending.lock().unwrap()[index].2.take().unwrap();
        let _ = gate.send(result);
    }

    pub fn filter_of(&self, index: usize) -> CatalogFilter {
        self.pending.lock().unwrap()[index].0.clone()
    }

    /// Yield until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.issued() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} calls, saw {}", n, self.issued());
    }
}

#[async_trait]
impl CatalogService for GatedCatalog {
    async fn query(&self, filter: &CatalogFilter, page: u32, _page_size: u32) -> Result<CatalogResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((filter.clone(), page, Some(tx)));
        self.issued.fetch_add(1, Ordering::SeqCst);
        rx.await.unwrap_or(Err(MarketError::Cancelled))
    }
}

pub fn response(names: &[&str], total: u64) -> CatalogResponse {
    CatalogResponse {
        items: names
            .iter()
            .map(|n| product(&n.to_lowercase(), n, &[("2024-01-01", "1.00")]))
            .collect(),
        total,
    }
}

// ---------------------------------------------------------------------------
// Product service fake
// ---------------------------------------------------------------------------

/// Product service whose `compare` calls are held open until resolved.
#[derive(Default)]
pub struct GatedProducts {
    pending: Mutex<Vec<(NaiveDate, Option<Gate<Vec<PriceObservation>>>)>>,
    issued: AtomicUsize,
    pub product: Mutex<Option<Product>>,
}

impl GatedProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(product: Product) -> Self {
        let s = Self::default();
        *s.product.lock().unwrap() = Some(product);
        s
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn resolve(&self, index: usize, result: Result<Vec<PriceObservation>>) {
        let gate = self.pending.lock().unwrap()[index].1.take().unwrap();
        let _ = gate.send(result);
    }

    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.issued() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} calls, saw {}", n, self.issued());
    }
}

#[async_trait]
impl ProductService for GatedProducts {
    async fn fetch_by_id(&self, id: &str) -> Result<Product> {
        self.product
            .lock()
            .unwrap()
            .clone()
            .filter(|p| p.id == id)
            .ok_or_else(|| MarketError::NotFound(format!("product {id}")))
    }

    async fn compare(&self, _id: &str, anchor: NaiveDate) -> Result<Vec<PriceObservation>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((anchor, Some(tx)));
        self.issued.fetch_add(1, Ordering::SeqCst);
        rx.await.unwrap_or(Err(MarketError::Cancelled))
    }
}
