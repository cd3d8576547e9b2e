//! "Last issued wins" request tracking.
//!
//! Every issued request takes a token from a monotonic counter. When a
//! request resolves, its result is applied only if its token is still the
//! latest and the owning view is still alive. Cancellation is logical:
//! superseded transports may finish, but their results are dropped.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::error::{MarketError, Result};

// ---------------------------------------------------------------------------
// ViewError: what presentation code gets to see
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewErrorKind {
    /// Transient transport or server failure; offer a retry.
    Network,
    /// The request succeeded but there is nothing for the chosen date.
    NoData,
    NotFound,
    Unauthorized,
    Validation,
    Other,
}

/// A recoverable, human-readable error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ViewErrorKind,
    pub message: String,
}

impl ViewError {
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ViewErrorKind::Network | ViewErrorKind::Other)
    }
}

impl From<&MarketError> for ViewError {
    fn from(err: &MarketError) -> Self {
        let (kind, message) = match err {
            MarketError::Validation(msg) => (ViewErrorKind::Validation, msg.clone()),
            MarketError::NoDataForDate { anchor, .. } => (
                ViewErrorKind::NoData,
                format!("No price data on or after {anchor}"),
            ),
            MarketError::EmptySeries => (
                ViewErrorKind::NoData,
                "No prices have been recorded yet".to_string(),
            ),
            MarketError::NotFound(msg) => (ViewErrorKind::NotFound, msg.clone()),
            MarketError::Unauthorized { .. } => (
                ViewErrorKind::Unauthorized,
                "Your session has expired, please sign in again".to_string(),
            ),
            e if e.is_retryable() => (
                ViewErrorKind::Network,
                "Could not reach the marketplace, please try again".to_string(),
            ),
            e => (ViewErrorKind::Other, e.to_string()),
        };
        Self { kind, message }
    }
}

// ---------------------------------------------------------------------------
// FetchTracker: synchronous token bookkeeping
// ---------------------------------------------------------------------------

/// Opaque token identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// How a resolved request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Result became the current data.
    Applied,
    /// Failure became the current error; previous data is kept.
    Failed,
    /// A newer request was issued meanwhile; result dropped.
    Superseded,
    /// The owning view was torn down; result dropped.
    Detached,
}

/// Applied state of a fetch, as rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSnapshot<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<ViewError>,
}

/// Token counter plus the data and error of the latest applied request.
///
/// Embed it next to any state that must change atomically with results,
/// and keep both under one lock.
#[derive(Debug)]
pub struct FetchTracker<T> {
    latest: u64,
    detached: bool,
    is_loading: bool,
    data: Option<T>,
    error: Option<ViewError>,
}

impl<T> Default for FetchTracker<T> {
    fn default() -> Self {
        Self {
            latest: 0,
            detached: false,
            is_loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> FetchTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede every outstanding request and hand out a new token.
    pub fn begin(&mut self) -> RequestToken {
        self.latest += 1;
        self.is_loading = !self.detached;
        tracing::debug!(token = self.latest, "issuing request");
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        !self.detached && token.0 == self.latest
    }

    /// Apply `result` if `token` is still current.
    pub fn settle(&mut self, token: RequestToken, result: Result<T>) -> Settled {
        if self.detached {
            tracing::trace!(token = token.0, "view detached, dropping response");
            return Settled::Detached;
        }
        if token.0 != self.latest {
            tracing::debug!(
                token = token.0,
                latest = self.latest,
                "dropping superseded response"
            );
            return Settled::Superseded;
        }

        match result {
            Ok(data) => {
                self.is_loading = false;
                self.data = Some(data);
                self.error = None;
                Settled::Applied
            }
            // Cancellation is never an error state.
            Err(MarketError::Cancelled) => {
                self.is_loading = false;
                Settled::Superseded
            }
            Err(e) => {
                tracing::warn!(token = token.0, error = %e, "request failed");
                self.is_loading = false;
                self.error = Some(ViewError::from(&e));
                Settled::Failed
            }
        }
    }

    /// Stop applying anything; pending requests resolve as `Detached`.
    pub fn teardown(&mut self) {
        self.detached = true;
        self.is_loading = false;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ViewError> {
        self.error.as_ref()
    }

    /// Replace the error without issuing anything (inline failures).
    pub fn set_error(&mut self, error: Option<ViewError>) {
        self.error = error;
    }
}

impl<T: Clone> FetchTracker<T> {
    pub fn snapshot(&self) -> FetchSnapshot<T> {
        FetchSnapshot {
            data: self.data.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// CancellableFetchController: shared async wrapper
// ---------------------------------------------------------------------------

/// A request already in flight. Awaiting it reports how it settled;
/// dropping it changes nothing.
pub type PendingFetch = BoxFuture<'static, Settled>;

/// Run `work` on its own task and hand back its outcome as a [`PendingFetch`].
pub(crate) fn spawn_settle<Fut>(work: Fut) -> PendingFetch
where
    Fut: Future<Output = Settled> + Send + 'static,
{
    let handle = tokio::spawn(work);
    Box::pin(async move {
        handle.await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fetch task did not complete");
            Settled::Detached
        })
    })
}

/// A [`PendingFetch`] that is already settled.
pub(crate) fn settled_now(outcome: Settled) -> PendingFetch {
    Box::pin(futures::future::ready(outcome))
}

/// Issues requests one at a time, keeping only the latest one's result.
///
/// Cloning shares the same state.
pub struct CancellableFetchController<T> {
    state: Arc<Mutex<FetchTracker<T>>>,
}

impl<T> Clone for CancellableFetchController<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for CancellableFetchController<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FetchTracker::new())),
        }
    }
}

impl<T: Send + 'static> CancellableFetchController<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `request`, superseding any outstanding one.
    ///
    /// The token is taken now, at call time, so issue order (not
    /// resolution order) decides which result wins.
    pub fn issue<Fut>(&self, request: Fut) -> PendingFetch
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.issue_then(request, |_| {})
    }

    /// Like [`issue`](Self::issue), running `on_applied` on the new data
    /// while the result is being applied.
    ///
    /// Must be called inside a Tokio runtime: the request starts on its own
    /// task right away, so dropping the returned future does not stop it.
    pub fn issue_then<Fut, F>(&self, request: Fut, on_applied: F) -> PendingFetch
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        F: FnOnce(&T) + Send + 'static,
    {
        let token = {
            let mut tracker = self.lock();
            if tracker.is_detached() {
                return settled_now(Settled::Detached);
            }
            tracker.begin()
        };
        let state = Arc::clone(&self.state);
        spawn_settle(async move {
            let result = request.await;
            let mut tracker = state.lock().unwrap_or_else(PoisonError::into_inner);
            let settled = tracker.settle(token, result);
            if settled == Settled::Applied {
                if let Some(data) = tracker.data() {
                    on_applied(data);
                }
            }
            settled
        })
    }

    pub fn teardown(&self) {
        self.lock().teardown();
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading()
    }

    fn lock(&self) -> MutexGuard<'_, FetchTracker<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + 'static> CancellableFetchController<T> {
    pub fn snapshot(&self) -> FetchSnapshot<T> {
        self.lock().snapshot()
    }
}
