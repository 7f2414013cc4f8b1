//! In-flight request deduplication
//!
//! Concurrent callers asking for the same key share one underlying fetch.
//! The registration is dropped as soon as that fetch settles, so the next
//! call after settlement starts a fresh one.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, warn};

use crate::error::FetchError;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, FetchError>>>;

/// One pending fetch. `fetch` holds a `SharedFetch<T>` for the caller's `T`.
struct Slot {
    id: u64,
    fetch: Box<dyn Any + Send + Sync>,
}

type Registry = Arc<Mutex<HashMap<String, Slot>>>;

/// Map of key to pending fetch, shared by every fetch path of the process.
#[derive(Default)]
pub struct Deduplicator {
    in_flight: Registry,
    next_id: AtomicU64,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // Slots are inserted and removed whole; a poisoned map is still consistent.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `operation` for `key`, or join the fetch already running for it.
    ///
    /// Every overlapping caller observes the same success or the same error.
    /// The fetch is driven on its own task, so it completes (and unregisters)
    /// even if all callers stop waiting.
    pub async fn dedupe<T, F, Fut>(&self, key: &str, operation: F) -> Result<T, FetchError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let fetch = {
            let mut in_flight = self.registry();
            let existing = in_flight
                .get(key)
                .map(|slot| slot.fetch.downcast_ref::<SharedFetch<T>>().cloned());

            match existing {
                Some(Some(shared)) => {
                    debug!("Joining in-flight fetch: {}", key);
                    shared
                }
                Some(None) => {
                    warn!(
                        "In-flight fetch for {} has a different value type; fetching separately",
                        key
                    );
                    operation().boxed().shared()
                }
                None => self.register(&mut in_flight, key, operation()),
            }
        };

        fetch.await
    }

    fn register<T, Fut>(
        &self,
        in_flight: &mut HashMap<String, Slot>,
        key: &str,
        fut: Fut,
    ) -> SharedFetch<T>
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.in_flight);
        let owned_key = key.to_string();

        let shared = async move {
            let result = fut.await;
            let mut map = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if map.get(&owned_key).is_some_and(|slot| slot.id == id) {
                map.remove(&owned_key);
            }
            result
        }
        .boxed()
        .shared();

        debug!("Starting fetch: {}", key);
        in_flight.insert(
            key.to_string(),
            Slot {
                id,
                fetch: Box::new(shared.clone()),
            },
        );

        tokio::spawn(shared.clone());
        shared
    }

    /// Number of fetches currently pending.
    pub fn in_flight(&self) -> usize {
        self.registry().len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.registry().contains_key(key)
    }
}
