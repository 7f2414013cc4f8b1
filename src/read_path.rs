//! Stale-while-revalidate reads
//!
//! A read hands back whatever the cache holds right away and starts a
//! background refresh of the same key. The caller renders the cached value,
//! then awaits the refresh to learn whether anything changed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::cache::CacheStore;
use crate::error::{FetchError, FetchResult};
use crate::fetch::{Deduplicator, RetryPolicy};

/// Outcome of the background refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh<T> {
    /// Fresh value differs from what was shown (or nothing was shown)
    Updated(T),
    Unchanged,
    /// Refresh failed; the cached value, if any, stays in place
    Failed {
        error: FetchError,
        has_fallback: bool,
    },
}

/// A cached value plus its pending refresh.
///
/// Dropping it does not cancel the refresh; the cache is still updated.
pub struct SwrRead<T> {
    cached: Option<T>,
    refresh: JoinHandle<FetchResult<T>>,
}

impl<T: PartialEq> SwrRead<T> {
    /// The value available without waiting, if any.
    pub fn cached(&self) -> Option<&T> {
        self.cached.as_ref()
    }

    /// Wait for the refresh and compare it with the cached value.
    pub async fn revalidate(self) -> Refresh<T> {
        let has_fallback = self.cached.is_some();
        let result = match self.refresh.await {
            Ok(result) => result,
            Err(err) => Err(FetchError::InvalidResponse(format!(
                "Refresh task aborted: {}",
                err
            ))),
        };

        match result {
            Ok(fresh) if self.cached.as_ref() == Some(&fresh) => Refresh::Unchanged,
            Ok(fresh) => Refresh::Updated(fresh),
            Err(error) => {
                debug!("Background refresh failed: {}", error);
                Refresh::Failed {
                    error,
                    has_fallback,
                }
            }
        }
    }
}

/// Cache-first reader shared by every consumer.
#[derive(Clone)]
pub struct Revalidator {
    store: Arc<CacheStore>,
    dedup: Arc<Deduplicator>,
    retry: RetryPolicy,
}

impl Revalidator {
    pub fn new(store: Arc<CacheStore>, dedup: Arc<Deduplicator>, retry: RetryPolicy) -> Self {
        Self {
            store,
            dedup,
            retry,
        }
    }

    /// Return the cached value for `key` now and refresh it in the background.
    ///
    /// Must be called within a tokio runtime.
    pub fn read<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> SwrRead<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let cached = self.store.get_cached::<T>(key);
        debug!(
            "SWR read {}: {}, {} refresh",
            key,
            if cached.is_some() { "hit" } else { "miss" },
            if self.dedup.is_in_flight(key) { "joining" } else { "starting" }
        );

        let this = self.clone();
        let key = key.to_string();
        let refresh = tokio::spawn(async move { this.fetch_and_store(&key, ttl, fetch).await });

        SwrRead { cached, refresh }
    }

    /// Cached value if fresh, otherwise fetch, store and return it.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> FetchResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        if let Some(value) = self.store.get_cached::<T>(key) {
            debug!("Cache hit: {}", key);
            return Ok(value);
        }
        debug!("Cache miss: {}", key);
        self.fetch_and_store(key, ttl, fetch).await
    }

    async fn fetch_and_store<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> FetchResult<T>
    where
        T: Serialize + Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let retry = self.retry;
        let value = self
            .dedup
            .dedupe(key, move || async move { retry.run(fetch).await })
            .await?;
        self.store.set_cached(key, &value, ttl);
        Ok(value)
    }
}
