//! Catalog listing state: filter, pager, debounced search and fetches.
//!
//! [`CatalogView`] owns the whole listing pipeline for one screen. Filter,
//! pager and fetch bookkeeping sit behind one lock so that a result, its
//! page count and the filter it was issued for are always replaced together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog_query::CatalogQuery;
use crate::config::{DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE};
use crate::debounce::{CommittedSearches, DebouncedSearchController};
use crate::fetch::{settled_now, spawn_settle, FetchTracker, PendingFetch, Settled, ViewError};
use crate::models::{CatalogFilter, CatalogInput, CatalogResponse, Page, Product};
use crate::pager::CatalogPager;
use crate::service::CatalogService;

// ---------------------------------------------------------------------------
// CatalogViewState
// ---------------------------------------------------------------------------

/// Everything a catalog screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogViewState {
    pub filter: CatalogFilter,
    pub page: u32,
    /// Never below 1, even for an empty catalog.
    pub total_pages: u32,
    pub total_count: u64,
    pub items: Vec<Product>,
    pub is_loading: bool,
    /// Last request failure. Items from the previous success stay visible.
    pub error: Option<ViewError>,
    /// Inline input problem; such input never reaches the network.
    pub validation_error: Option<String>,
}

struct ViewModel {
    input: CatalogInput,
    query: CatalogQuery,
    pager: CatalogPager,
    fetch: FetchTracker<CatalogResponse>,
    validation_error: Option<String>,
}

impl ViewModel {
    fn state(&self) -> CatalogViewState {
        CatalogViewState {
            filter: self.query.filter().clone(),
            page: self.pager.page_number(),
            total_pages: self.pager.display_total_pages(),
            total_count: self.pager.total_count(),
            items: self
                .fetch
                .data()
                .map(|r| r.items.clone())
                .unwrap_or_default(),
            is_loading: self.fetch.is_loading(),
            error: self.fetch.error().cloned(),
            validation_error: self.validation_error.clone(),
        }
    }
}

struct ViewInner {
    service: Arc<dyn CatalogService>,
    model: Mutex<ViewModel>,
    debouncer: DebouncedSearchController,
    listener: Mutex<Option<JoinHandle<()>>>,
    state_tx: watch::Sender<CatalogViewState>,
}

impl ViewInner {
    fn lock_model(&self) -> MutexGuard<'_, ViewModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, model: &ViewModel) {
        self.state_tx.send_replace(model.state());
    }
}

// ---------------------------------------------------------------------------
// CatalogView
// ---------------------------------------------------------------------------

/// Paginated, filterable product listing backed by a [`CatalogService`].
///
/// Must be created inside a Tokio runtime. Mutating methods take effect
/// immediately and return the fetch they issued (if any). The request is
/// already running on its own task, so awaiting it is optional; the view
/// applies the result either way. After [`teardown`](Self::teardown)
/// nothing is issued any more.
#[derive(Clone)]
pub struct CatalogView {
    inner: Arc<ViewInner>,
}

impl CatalogView {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self::with_settings(service, DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE)
    }

    pub fn with_settings(service: Arc<dyn CatalogService>, page_size: u32, quiet: Duration) -> Self {
        let (debouncer, commits) = DebouncedSearchController::new(quiet);
        let model = ViewModel {
            input: CatalogInput::default(),
            query: CatalogQuery::new(),
            pager: CatalogPager::new(page_size),
            fetch: FetchTracker::new(),
            validation_error: None,
        };
        let (state_tx, _) = watch::channel(model.state());

        let inner = Arc::new(ViewInner {
            service,
            model: Mutex::new(model),
            debouncer,
            listener: Mutex::new(None),
            state_tx,
        });

        tracing::info!(page_size, quiet_ms = quiet.as_millis() as u64, "catalog view registered");
        let listener = tokio::spawn(listen_for_commits(Arc::downgrade(&inner), commits));
        *inner.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);

        Self { inner }
    }

    /// Fetch the current page with the current filter.
    ///
    /// Also the retry affordance after a failure.
    pub fn refresh(&self) -> PendingFetch {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() {
            return settled_now(Settled::Detached);
        }
        self.dispatch(&mut model)
    }

    /// Feed a keystroke's worth of search text. Debounced; nothing is
    /// fetched until the input has been quiet for the configured period.
    pub fn set_search_text(&self, text: impl Into<String>) {
        self.inner.debouncer.input(text);
    }

    /// Set the creation-date bounds (`YYYY-MM-DD`, empty for open).
    ///
    /// Applied immediately. Returns `None` when the input is invalid; the
    /// problem is then reported through `validation_error`.
    pub fn set_date_range(&self, start: Option<&str>, end: Option<&str>) -> Option<PendingFetch> {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() {
            return None;
        }
        model.input.start_date = start.map(str::to_string);
        model.input.end_date = end.map(str::to_string);
        self.apply_input(&mut model)
    }

    /// Set the sort key, e.g. `pricePerUnit:asc` or `newest`. Applied
    /// immediately.
    pub fn set_sort(&self, sort_key: &str) -> Option<PendingFetch> {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() {
            return None;
        }
        model.input.sort = Some(sort_key.to_string());
        self.apply_input(&mut model)
    }

    /// Returns `None` on the last page, where nothing changes.
    pub fn next_page(&self) -> Option<PendingFetch> {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() || !model.pager.go_to_next_page() {
            return None;
        }
        Some(self.dispatch(&mut model))
    }

    /// Returns `None` on page 1, where nothing changes.
    pub fn previous_page(&self) -> Option<PendingFetch> {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() || !model.pager.go_to_previous_page() {
            return None;
        }
        Some(self.dispatch(&mut model))
    }

    pub fn state(&self) -> CatalogViewState {
        self.inner.lock_model().state()
    }

    /// The page currently on screen, with its items.
    pub fn current_page(&self) -> Page {
        let model = self.inner.lock_model();
        let items = model.fetch.data().map(|r| r.items.clone()).unwrap_or_default();
        model.pager.page(items)
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<CatalogViewState> {
        self.inner.state_tx.subscribe()
    }

    /// Stop the search timer and drop every pending result.
    pub fn teardown(&self) {
        self.inner.debouncer.cancel();
        if let Some(listener) = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
        let mut model = self.inner.lock_model();
        model.fetch.teardown();
        self.inner.publish(&model);
    }

    fn commit_search_text(&self, text: String) -> Option<PendingFetch> {
        let mut model = self.inner.lock_model();
        if model.fetch.is_detached() {
            return None;
        }
        model.input.search_text = text;
        self.apply_input(&mut model)
    }

    /// Validate the stored input; on success reset to page 1 and fetch.
    fn apply_input(&self, model: &mut ViewModel) -> Option<PendingFetch> {
        let ViewModel {
            input,
            query,
            pager,
            ..
        } = model;
        let applied = query.apply(input, pager).map(|_| ());
        match applied {
            Ok(()) => {
                model.validation_error = None;
                Some(self.dispatch(model))
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected catalog input");
                model.validation_error = Some(e.to_string());
                self.inner.publish(model);
                None
            }
        }
    }

    fn dispatch(&self, model: &mut ViewModel) -> PendingFetch {
        let token = model.fetch.begin();
        let filter = model.query.filter().clone();
        let page = model.pager.page_number();
        let page_size = model.pager.page_size();
        self.inner.publish(model);

        let inner = Arc::clone(&self.inner);
        spawn_settle(async move {
            let result = inner.service.query(&filter, page, page_size).await;

            let mut model = inner.lock_model();
            let settled = model.fetch.settle(token, result);
            if settled == Settled::Applied {
                let total = model.fetch.data().map(|r| r.total).unwrap_or(0);
                model.pager.set_total_count(total);
            }
            if settled != Settled::Detached {
                inner.publish(&model);
            }
            settled
        })
    }
}

async fn listen_for_commits(view: Weak<ViewInner>, mut commits: CommittedSearches) {
    while let Some(text) = commits.next().await {
        let Some(inner) = view.upgrade() else {
            break;
        };
        let view = CatalogView { inner };
        // The fetch runs on its own task; nothing to await here.
        let _ = view.commit_search_text(text);
    }
}
