use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Invalid filter: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request superseded by a newer request")]
    Cancelled,

    #[error("Price series is empty")]
    EmptySeries,

    #[error("No price data for product {product_id} on or after {anchor}")]
    NoDataForDate { product_id: String, anchor: NaiveDate },

    #[error("Session rejected by server (HTTP {status})")]
    Unauthorized { status: u16 },

    #[cfg(feature = "local-store")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl MarketError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, timeouts and 5xx responses are retryable; domain
    /// conditions (validation, no data, not found) and auth rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::Network(_) => true,
            MarketError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
