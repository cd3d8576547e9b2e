use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.localmarket.example/v1";
pub const SNAPSHOT_BASE: &str = "https://exports.localmarket.example/catalog";
pub const SNAPSHOT_META_URL: &str = "https://exports.localmarket.example/catalog/meta.json";

/// Number of products per catalog page.
pub const DEFAULT_PAGE_SIZE: u32 = 32;

/// Quiet period before a typed search is committed.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transient failures are retried this many times for idempotent reads.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Catalog export files, keyed by the local table they populate.
///
/// Import order matters: observations reference products.
pub fn snapshot_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("products", "products.ndjson.gz"),
        ("price_observations", "price_observations.ndjson.gz"),
    ]
}

/// Sort keys accepted from user input, mapped to their canonical form.
pub fn sort_key_aliases() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("newest", "createdAt:desc"),
        ("oldest", "createdAt:asc"),
        ("price_low", "pricePerUnit:asc"),
        ("price_high", "pricePerUnit:desc"),
    ])
}

pub fn default_cache_dir() -> PathBuf {
    if let Some(cache) = dirs::cache_dir() {
        cache.join("localmarket-sdk")
    } else {
        PathBuf::from(".localmarket-sdk-cache")
    }
}
