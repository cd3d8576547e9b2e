//! Debouncing of free-text search input.
//!
//! Each keystroke restarts a single quiet-period timer; only the value that
//! survives a full quiet period is committed downstream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SEARCH_DEBOUNCE;

/// Coalesces rapid input changes into one committed value per quiet period.
///
/// Must be used from within a Tokio runtime, since each input schedules a
/// timer task.
pub struct DebouncedSearchController {
    quiet: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    tx: mpsc::UnboundedSender<String>,
}

/// Receiving side of a [`DebouncedSearchController`].
pub struct CommittedSearches {
    rx: mpsc::UnboundedReceiver<String>,
}

impl CommittedSearches {
    /// Wait for the next committed value. `None` once the controller is gone.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// A committed value if one is already waiting.
    pub fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl DebouncedSearchController {
    pub fn new(quiet: Duration) -> (Self, CommittedSearches) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            quiet,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            tx,
        };
        (controller, CommittedSearches { rx })
    }

    /// A controller using the standard 500 ms quiet period.
    pub fn with_default_quiet_period() -> (Self, CommittedSearches) {
        Self::new(SEARCH_DEBOUNCE)
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record a new input value, cancelling any timer still pending.
    pub fn input(&self, value: impl Into<String>) {
        let value = value.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = pending.take() {
            timer.abort();
        }

        let latest = Arc::clone(&self.generation);
        let tx = self.tx.clone();
        let quiet = self.quiet;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            // A newer input may have landed while this timer was waking up.
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            tracing::debug!(search = %value, "committing debounced search");
            let _ = tx.send(value);
        }));
    }

    /// Drop the pending timer, if any, without committing its value.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DebouncedSearchController {
    fn drop(&mut self) {
        self.cancel();
    }
}
