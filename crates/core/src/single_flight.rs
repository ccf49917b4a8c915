//! Process-local request coalescing.
//!
//! [`SingleFlight`] guarantees that at most one future per key is in flight
//! inside this process. Callers that arrive while a flight for the same key
//! is outstanding await the same shared future and receive a clone of its
//! output instead of starting a second one.
//!
//! The guard is scoped to one process. It deduplicates, it does not
//! serialize across processes; anything that needs that must be enforced by
//! the storage layer.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<V> = Shared<BoxFuture<'static, Result<V, FlightAborted>>>;
type Table<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

/// The flight's task panicked or was cancelled by runtime shutdown, so no
/// output exists to share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight task ended without producing a result")]
pub struct FlightAborted;

/// Keyed single-flight coordinator.
///
/// Cheaply cloneable; clones share the same in-flight table.
pub struct SingleFlight<K, V> {
    in_flight: Table<K, V>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Removes a key from the table when the flight's task ends, including by
/// panic or cancellation.
struct Landing<K: Eq + Hash, V> {
    table: Table<K, V>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for Landing<K, V> {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key`, or join the flight already running for it.
    ///
    /// `make` is only invoked by the caller that opens the flight, and its
    /// future runs on its own tokio task. The flight therefore finishes and
    /// leaves the table even when every caller awaiting it is dropped; a
    /// later call for the same key always starts fresh.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<V, FlightAborted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut table = self.table();
            match table.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let work = make();
                    let landing = Landing {
                        table: Arc::clone(&self.in_flight),
                        key: key.clone(),
                    };
                    // The task cannot land before the insert below: it needs
                    // the table lock held here.
                    let task = tokio::spawn(async move {
                        let output = work.await;
                        drop(landing);
                        output
                    });
                    let flight = task
                        .map(|joined| joined.map_err(|_| FlightAborted))
                        .boxed()
                        .shared();
                    table.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Number of keys with an outstanding flight.
    pub fn in_flight(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<K, Flight<V>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_calls_share_one_execution() {
        let flights: SingleFlight<String, usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |calls: Arc<AtomicUsize>| {
            let flights = flights.clone();
            async move {
                flights
                    .run("k".to_string(), move || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        calls.fetch_add(1, Ordering::SeqCst) + 1
                    })
                    .await
            }
        };

        let (a, b, c) = tokio::join!(
            run(Arc::clone(&calls)),
            run(Arc::clone(&calls)),
            run(Arc::clone(&calls))
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((a, b, c), (Ok(1), Ok(1), Ok(1)));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn sequential_calls_run_again() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new();

        let first = flights.run("k", || async { 1 }).await;
        let second = flights.run("k", || async { 2 }).await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let (a, b) = tokio::join!(
            flights.run(1, || async { 10 }),
            flights.run(2, || async { 20 })
        );

        assert_eq!((a, b), (Ok(10), Ok(20)));
    }

    #[tokio::test]
    async fn abandoned_flight_still_finishes_and_lands() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let opener = {
            let flights = flights.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                flights
                    .run("k", move || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        1
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(flights.in_flight(), 1);
        opener.abort();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);

        // Nothing stale is left to join.
        assert_eq!(flights.run("k", || async { 2 }).await, Ok(2));
    }

    #[tokio::test]
    async fn panicking_flight_reports_aborted_and_lands() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let result = flights
            .run(1, || async {
                let fail = true;
                if fail {
                    panic!("flight body failed");
                }
                0
            })
            .await;

        assert_eq!(result, Err(FlightAborted));
        assert_eq!(flights.in_flight(), 0);
        assert_eq!(flights.run(1, || async { 7 }).await, Ok(7));
    }
}
