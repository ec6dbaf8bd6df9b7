//! Interval refetching of live data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::bus::{QueryError, QueryResult};

/// Latest outcome of a polled query.
///
/// A failed refetch keeps the last good `data` and records the error.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<QueryError>,
    /// When `data` was last fetched successfully.
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Handle to a background polling task. Dropping it stops the task.
pub struct Poll<T> {
    state: watch::Receiver<QueryState<T>>,
    refetch: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T> Poll<T> {
    /// Snapshot of the current state.
    pub fn current(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every fetch outcome.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.clone()
    }

    /// Fetch now instead of waiting for the next tick.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }
}

impl<T> Drop for Poll<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that runs `fetch` immediately and then every `interval`,
/// publishing each outcome.
pub fn poll<T, F, Fut>(interval: Duration, fetch: F) -> Poll<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = QueryResult<T>> + Send,
{
    let (tx, rx) = watch::channel(QueryState::default());
    let refetch = Arc::new(Notify::new());
    let wake = refetch.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake.notified() => ticker.reset(),
            }

            let result = fetch().await;
            tx.send_modify(|state| match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.updated_at = Some(Utc::now());
                }
                Err(e) => state.error = Some(e),
            });
        }
    });

    Poll {
        state: rx,
        refetch,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::olhovivo::OlhoVivoError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_fetch(
        count: Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<QueryResult<usize>> + Send + 'static {
        move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(Arc::new(n)))
        }
    }

    #[tokio::test]
    async fn fetches_immediately_and_on_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll = poll(Duration::from_millis(20), counter_fetch(count.clone()));
        let mut rx = poll.subscribe();

        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.data.as_deref().is_some_and(|n| *n >= 3)),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(poll.current().updated_at.is_some());
    }

    #[tokio::test]
    async fn manual_refetch_skips_the_wait() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll = poll(Duration::from_secs(3600), counter_fetch(count.clone()));
        let mut rx = poll.subscribe();

        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.data.is_some()))
            .await
            .unwrap()
            .unwrap();

        poll.refetch();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.data.as_deref() == Some(&2)),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn failure_keeps_last_data() {
        let count = Arc::new(AtomicUsize::new(0));
        let calls = count.clone();
        let poll = poll(Duration::from_millis(10), move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n == 0 {
                Ok(Arc::new("first"))
            } else {
                Err(Arc::new(OlhoVivoError::Authentication))
            })
        });
        let mut rx = poll.subscribe();

        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.error.is_some()))
            .await
            .unwrap()
            .unwrap();

        let state = poll.current();
        assert_eq!(state.data.as_deref(), Some(&"first"));
    }

    #[tokio::test]
    async fn dropping_handle_stops_polling() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll = poll(Duration::from_millis(5), counter_fetch(count.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(poll);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_drop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
