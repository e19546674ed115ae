//! Single-flight request coalescing.
//!
//! At most one unit of work runs per key at a time. Callers arriving while
//! it runs subscribe to its result instead of starting another. The work
//! runs as a detached task, so a caller that stops waiting never cancels it
//! for the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::error;

/// Error waiting on a coalesced result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoalesceError {
    /// The shared work ended without producing a result (it panicked)
    #[error("in-flight work for {key} ended without a result")]
    Aborted { key: String },
}

type Registry<T> = Arc<Mutex<HashMap<String, broadcast::Sender<T>>>>;

/// Deduplicates concurrent work by key.
///
/// Cloning is cheap; clones share the in-flight table.
pub struct Coalescer<T> {
    in_flight: Registry<T>,
}

impl<T> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Clone + Send + 'static> Coalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or join the run already in flight.
    ///
    /// Every caller for the same run receives a clone of the same result.
    pub async fn fetch<F, Fut>(&self, key: &str, work: F) -> Result<T, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (mut rx, _) = self.join_or_start(key, work);
        rx.recv().await.map_err(|_| CoalesceError::Aborted {
            key: key.to_string(),
        })
    }

    /// Start `work` for `key` unless a run is already in flight, without
    /// waiting for it.
    ///
    /// Returns whether a new run was started.
    pub fn trigger<F, Fut>(&self, key: &str, work: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.join_or_start(key, work).1
    }

    /// Number of keys with work in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    fn join_or_start<F, Fut>(&self, key: &str, work: F) -> (broadcast::Receiver<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = {
            let mut in_flight = self.in_flight.lock();
            if let Some(tx) = in_flight.get(key) {
                return (tx.subscribe(), false);
            }
            let (tx, rx) = broadcast::channel(1);
            in_flight.insert(key.to_string(), tx.clone());
            (tx, rx)
        };

        let registration = Registration {
            in_flight: Arc::clone(&self.in_flight),
            key: key.to_string(),
        };
        let fut = work();
        tokio::spawn(async move {
            let value = fut.await;
            // Deregister before releasing waiters; a caller arriving now
            // starts a fresh run rather than joining a finished one.
            drop(registration);
            // Err only means nobody is waiting any more.
            let _ = tx.send(value);
        });

        (rx, true)
    }
}

/// Removes a key from the in-flight table when dropped, on every exit path
/// of the work including a panic.
struct Registration<T> {
    in_flight: Registry<T>,
    key: String,
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        if self.in_flight.lock().remove(&self.key).is_none() {
            error!(key = %self.key, "coalescer registration already cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_run() {
        let coalescer: Coalescer<u32> = Coalescer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let callers = (0..10).map(|_| {
            let coalescer = coalescer.clone();
            let runs = runs.clone();
            async move {
                coalescer
                    .fetch("route:JFK:LAX", || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }
        });
        let results = futures::future::join_all(callers).await;

        assert!(results.iter().all(|r| *r == Ok(42)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_shared_and_cleared() {
        let coalescer: Coalescer<Result<u32, String>> = Coalescer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = || {
            let runs = runs.clone();
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<u32, _>("upstream down".to_string())
            }
        };

        let (a, b) = tokio::join!(coalescer.fetch("k", call()), coalescer.fetch("k", call()));
        assert_eq!(a, Ok(Err("upstream down".to_string())));
        assert_eq!(a, b);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!coalescer.is_in_flight("k"));

        // A later call starts a fresh run.
        let _ = coalescer.fetch("k", call()).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_work_clears_registration() {
        let coalescer: Coalescer<u32> = Coalescer::new();
        let result = coalescer
            .fetch("k", || async {
                panic!("boom");
            })
            .await;
        assert_eq!(result, Err(CoalesceError::Aborted { key: "k".into() }));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiter_does_not_cancel_work() {
        let coalescer: Coalescer<u32> = Coalescer::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            coalescer.fetch("k", || async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                done.fetch_add(1, Ordering::SeqCst);
                7
            }),
        )
        .await;
        assert!(waited.is_err());
        assert!(coalescer.is_in_flight("k"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_run_independently() {
        let coalescer: Coalescer<&'static str> = Coalescer::new();
        let slow = coalescer.fetch("slow", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "slow"
        });
        let fast = coalescer.fetch("fast", || async { "fast" });

        tokio::select! {
            _ = slow => panic!("slow key finished first"),
            r = fast => assert_eq!(r, Ok("fast")),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_joins_existing_run() {
        let coalescer: Coalescer<u32> = Coalescer::new();
        assert!(coalescer.trigger("k", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            1
        }));
        assert!(!coalescer.trigger("k", || async { 2 }));
        assert_eq!(coalescer.fetch("k", || async { 3 }).await, Ok(1));
    }
}
