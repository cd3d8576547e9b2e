//! HTTP implementation of the catalog and product services.
//!
//! # Example
//!
//! ```no_run
//! use localmarket_sdk::http::{BearerAuth, HttpMarketClient, SessionGuard, SessionToken};
//!
//! # fn example() -> localmarket_sdk::Result<()> {
//! let token = SessionToken::new();
//! let on_expired = token.clone();
//! let client = HttpMarketClient::builder()
//!     .base_url("https://api.localmarket.example/v1")
//!     .request_interceptor(BearerAuth::new(token.clone()))
//!     .response_interceptor(SessionGuard::new(move |_| on_expired.clear()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod interceptor;

pub use interceptor::{
    BearerAuth, CredentialProvider, InterceptorPipeline, RequestInterceptor, ResponseInterceptor,
    SessionGuard, SessionToken, StaticToken,
};

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use reqwest::{Client, Response, StatusCode, Url};

use crate::config;
use crate::error::{MarketError, Result};
use crate::models::{CatalogFilter, CatalogResponse, PriceObservation, Product};
use crate::service::{CatalogService, ProductService};

const BACKOFF_BASE: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// HttpMarketClientBuilder
// ---------------------------------------------------------------------------

/// Builder for an [`HttpMarketClient`].
pub struct HttpMarketClientBuilder {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    pipeline: InterceptorPipeline,
}

impl Default for HttpMarketClientBuilder {
    fn default() -> Self {
        Self {
            base_url: config::DEFAULT_API_BASE.to_string(),
            timeout: config::DEFAULT_TIMEOUT,
            max_retries: config::DEFAULT_MAX_RETRIES,
            pipeline: InterceptorPipeline::new(),
        }
    }
}

impl HttpMarketClientBuilder {
    /// API root, e.g. `https://api.localmarket.example/v1`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries for transient failures of idempotent reads. Defaults to 2.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn request_interceptor<I: RequestInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.pipeline = self.pipeline.with_request(interceptor);
        self
    }

    pub fn response_interceptor<I: ResponseInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.pipeline = self.pipeline.with_response(interceptor);
        self
    }

    pub fn build(self) -> Result<HttpMarketClient> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            MarketError::InvalidArgument(format!("invalid base URL '{}': {e}", self.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MarketError::InvalidArgument(format!(
                "base URL '{}' cannot have path segments",
                self.base_url
            )));
        }
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(HttpMarketClient {
            client,
            base_url,
            max_retries: self.max_retries,
            pipeline: self.pipeline,
        })
    }
}

// ---------------------------------------------------------------------------
// HttpMarketClient
// ---------------------------------------------------------------------------

/// Marketplace API client implementing [`CatalogService`] and
/// [`ProductService`].
#[derive(Clone)]
pub struct HttpMarketClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    pipeline: InterceptorPipeline,
}

impl HttpMarketClient {
    pub fn builder() -> HttpMarketClientBuilder {
        HttpMarketClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked for cannot-be-a-base in build().
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET with interceptors, retrying transient failures with jittered
    /// exponential backoff.
    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.get(url.clone()).query(query).build()?;
            self.pipeline.apply_request(&mut request)?;
            tracing::debug!(url = %request.url(), attempt, "GET");

            let outcome = match self.client.execute(request).await {
                Ok(resp) => {
                    self.pipeline.apply_response(resp.status(), resp.url())?;
                    if resp.status().is_server_error() {
                        Err(MarketError::Network(format!(
                            "server responded {}",
                            resp.status()
                        )))
                    } else {
                        return Ok(resp);
                    }
                }
                Err(e) => Err(MarketError::from(e)),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::debug!(error = %e, ?delay, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
                Ok(resp) => return Ok(resp),
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE * 2u32.saturating_pow(attempt);
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter_ms)
}

fn catalog_params(filter: &CatalogFilter, page: u32, page_size: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("sortField", filter.sort_field.as_str().to_string()),
        ("sortOrder", filter.sort_order.as_str().to_string()),
        ("page", page.to_string()),
        ("limit", page_size.to_string()),
    ];
    if !filter.search_text.is_empty() {
        params.push(("search", filter.search_text.clone()));
    }
    if let Some(start) = filter.date_range.start {
        params.push(("startDate", start.to_string()));
    }
    if let Some(end) = filter.date_range.end {
        params.push(("endDate", end.to_string()));
    }
    params
}

#[async_trait]
impl CatalogService for HttpMarketClient {
    async fn query(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
    ) -> Result<CatalogResponse> {
        let params = catalog_params(filter, page, page_size);
        let resp = self.get(self.endpoint(&["products"]), &params).await?;
        Ok(resp.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl ProductService for HttpMarketClient {
    async fn fetch_by_id(&self, id: &str) -> Result<Product> {
        let resp = self.get(self.endpoint(&["products", id]), &[]).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(MarketError::NotFound(format!("product {id}")));
        }
        Ok(resp.error_for_status()?.json().await?)
    }

    async fn compare(&self, id: &str, anchor: NaiveDate) -> Result<Vec<PriceObservation>> {
        let params = [("date", anchor.to_string())];
        let resp = self
            .get(self.endpoint(&["products", id, "compare"]), &params)
            .await?;
        let no_data = || MarketError::NoDataForDate {
            product_id: id.to_string(),
            anchor,
        };
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(no_data());
        }
        let observations: Vec<PriceObservation> = resp.error_for_status()?.json().await?;
        if observations.is_empty() {
            return Err(no_data());
        }
        Ok(observations)
    }
}
