//! Outbound and inbound interceptor stages for the HTTP client.
//!
//! Credentials are attached by a request stage and auth failures are
//! classified by a response stage; neither relies on global state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, StatusCode, Url};

use crate::error::{MarketError, Result};

/// Runs on every outgoing request before it is sent.
pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, request: &mut Request) -> Result<()>;
}

/// Runs on every response status before the body is read.
///
/// Returning an error aborts the call with that error.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, status: StatusCode, url: &Url) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Supplies the current session token, if the user is signed in.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, e.g. for service accounts and tests.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

/// Shared, replaceable session token.
///
/// Clones share the same slot, so the sign-in flow can `set` it and a
/// [`SessionGuard`] callback can `clear` it.
#[derive(Clone, Default)]
pub struct SessionToken {
    current: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl CredentialProvider for SessionToken {
    fn bearer_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Attaches `Authorization: Bearer <token>` when a token is available.
pub struct BearerAuth<P> {
    provider: P,
}

impl<P: CredentialProvider> BearerAuth<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: CredentialProvider> RequestInterceptor for BearerAuth<P> {
    fn on_request(&self, request: &mut Request) -> Result<()> {
        let Some(token) = self.provider.bearer_token() else {
            return Ok(());
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            MarketError::InvalidArgument("session token contains invalid header characters".into())
        })?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionGuard
// ---------------------------------------------------------------------------

type InvalidationCallback = Arc<dyn Fn(StatusCode) + Send + Sync>;

/// Turns 401/403 responses into [`MarketError::Unauthorized`] and notifies
/// the application so it can drop the session.
#[derive(Clone)]
pub struct SessionGuard {
    on_invalidated: InvalidationCallback,
}

impl SessionGuard {
    pub fn new<F>(on_invalidated: F) -> Self
    where
        F: Fn(StatusCode) + Send + Sync + 'static,
    {
        Self {
            on_invalidated: Arc::new(on_invalidated),
        }
    }
}

impl ResponseInterceptor for SessionGuard {
    fn on_response(&self, status: StatusCode, url: &Url) -> Result<()> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(%status, path = url.path(), "session rejected, invalidating");
            (self.on_invalidated)(status);
            return Err(MarketError::Unauthorized {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InterceptorPipeline
// ---------------------------------------------------------------------------

/// Ordered request and response stages.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request<I: RequestInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.request.push(Arc::new(interceptor));
        self
    }

    pub fn with_response<I: ResponseInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.response.push(Arc::new(interceptor));
        self
    }

    /// Run request stages in registration order, stopping at the first error.
    pub fn apply_request(&self, request: &mut Request) -> Result<()> {
        for stage in &self.request {
            stage.on_request(request)?;
        }
        Ok(())
    }

    pub fn apply_response(&self, status: StatusCode, url: &Url) -> Result<()> {
        for stage in &self.response {
            stage.on_response(status, url)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty()
    }
}
