//! "Latest query wins" request supersession.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Runs one request at a time per input slot: starting a new request
/// aborts the one in flight, and a superseded result is never published
/// over a newer one.
pub struct LatestQuery<T> {
    generation: AtomicU64,
    inflight: Mutex<Option<AbortHandle>>,
    results: Arc<watch::Sender<Option<(u64, T)>>>,
}

impl<T: Send + Sync + 'static> Default for LatestQuery<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> LatestQuery<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            generation: AtomicU64::new(0),
            inflight: Mutex::new(None),
            results: Arc::new(tx),
        }
    }

    /// Start `fut`, superseding any request still in flight.
    pub fn run<F>(&self, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        // Numbering, spawning and swapping happen under one lock so a
        // later request is never aborted by an earlier one.
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let results = self.results.clone();

        let handle = tokio::spawn(async move {
            let value = fut.await;
            results.send_if_modified(|current| {
                let newer = current.as_ref().is_none_or(|(g, _)| *g < generation);
                if newer {
                    *current = Some((generation, value));
                }
                newer
            });
        });

        if let Some(previous) = inflight.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Receiver of published results, tagged with their request number.
    pub fn subscribe(&self) -> watch::Receiver<Option<(u64, T)>> {
        self.results.subscribe()
    }
}

impl<T: Clone> LatestQuery<T> {
    /// Most recently published result.
    pub fn latest(&self) -> Option<T> {
        self.results.borrow().as_ref().map(|(_, v)| v.clone())
    }
}
