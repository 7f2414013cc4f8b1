//! TTL-enveloped cache store
//!
//! Wraps a `StorageMedium` with JSON serialization and a freshness envelope.
//! Reads and writes are best-effort: a broken medium degrades to "nothing
//! cached" and never surfaces an error to callers.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::medium::StorageMedium;
use super::policy;
use crate::error::CacheError;

/// Stored envelope: value plus write time and validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: i64,
    pub ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn is_fresh(&self, now_ms: i64) -> bool {
        policy::is_fresh(self.stored_at, self.ttl(), now_ms)
    }
}

/// Envelope with the value left unparsed, for bookkeeping passes.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[allow(dead_code)]
    value: serde::de::IgnoredAny,
    stored_at: i64,
    ttl_ms: u64,
}

impl RawEntry {
    fn is_fresh(&self, now_ms: i64) -> bool {
        policy::is_fresh(self.stored_at, Duration::from_millis(self.ttl_ms), now_ms)
    }
}

/// Process-wide cache over a storage medium.
///
/// The medium sits behind a mutex so each read-modify-write is atomic with
/// respect to other tasks; the lock is never held across an `.await`.
pub struct CacheStore {
    medium: Mutex<Box<dyn StorageMedium>>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(medium: Box<dyn StorageMedium>) -> Self {
        Self::with_clock(medium, Arc::new(SystemClock))
    }

    pub fn with_clock(medium: Box<dyn StorageMedium>, clock: Arc<dyn Clock>) -> Self {
        Self {
            medium: Mutex::new(medium),
            clock,
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Box<dyn StorageMedium>>> {
        match self.medium.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::debug!("Cache medium lock poisoned; treating cache as empty");
                None
            }
        }
    }

    /// Fresh value for `key`, or `None` when absent, expired, or unreadable.
    pub fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut medium = self.lock()?;
        let raw = match medium.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Evicting corrupt cache entry {}: {}", key, e);
                let _ = medium.remove_item(key);
                return None;
            }
        };

        if !entry.is_fresh(self.clock.now_ms()) {
            log::debug!("Cache expired: {}", key);
            let _ = medium.remove_item(key);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                log::debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                log::debug!("Cache entry {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`. Failures are logged and dropped.
    pub fn set_cached<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now_ms(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                log::debug!("Cache serialization failed for {}: {}", key, e);
                return;
            }
        };

        let Some(mut medium) = self.lock() else {
            return;
        };

        match medium.set_item(key, &json) {
            Ok(()) => {}
            Err(CacheError::QuotaExceeded { .. }) => {
                let freed = self.make_room(&mut **medium);
                log::debug!("Cache full writing {}; freed {} entries", key, freed);
                if let Err(e) = medium.set_item(key, &json) {
                    log::debug!("Cache write dropped for {}: {}", key, e);
                }
            }
            Err(e) => log::debug!("Cache write dropped for {}: {}", key, e),
        }
    }

    /// Remove `key` unconditionally.
    pub fn invalidate(&self, key: &str) {
        if let Some(mut medium) = self.lock()
            && let Err(e) = medium.remove_item(key)
        {
            log::debug!("Cache invalidate failed for {}: {}", key, e);
        }
    }

    /// Remove every key starting with `prefix`; returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let Some(mut medium) = self.lock() else {
            return 0;
        };
        let keys = medium.keys().unwrap_or_default();
        keys.iter()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| medium.remove_item(k).is_ok())
            .count()
    }

    /// Milliseconds since `key` was written, if it is present and fresh.
    pub fn entry_age(&self, key: &str) -> Option<u64> {
        let medium = self.lock()?;
        let raw = medium.get_item(key).ok()??;
        let entry: RawEntry = serde_json::from_str(&raw).ok()?;
        let now = self.clock.now_ms();
        entry
            .is_fresh(now)
            .then(|| policy::age_ms(entry.stored_at, now))
    }

    /// Drop expired and corrupt entries.
    pub fn purge_expired(&self) -> std::result::Result<usize, CacheError> {
        let mut medium = self
            .lock()
            .ok_or_else(|| CacheError::Unavailable("lock poisoned".to_string()))?;
        let now = self.clock.now_ms();
        let mut removed = 0;
        for key in medium.keys()? {
            let stale = match medium.get_item(&key)? {
                Some(raw) => serde_json::from_str::<RawEntry>(&raw)
                    .map(|e| !e.is_fresh(now))
                    .unwrap_or(true),
                None => false,
            };
            if stale {
                medium.remove_item(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove all entries.
    pub fn clear(&self) -> std::result::Result<usize, CacheError> {
        let mut medium = self
            .lock()
            .ok_or_else(|| CacheError::Unavailable("lock poisoned".to_string()))?;
        medium.clear()
    }

    /// Where the medium keeps its data.
    pub fn location(&self) -> String {
        self.lock()
            .map(|m| m.location())
            .unwrap_or_else(|| "unavailable".to_string())
    }

    pub fn stats(&self) -> std::result::Result<CacheStats, CacheError> {
        let medium = self
            .lock()
            .ok_or_else(|| CacheError::Unavailable("lock poisoned".to_string()))?;
        let now = self.clock.now_ms();
        let mut stats = CacheStats::default();

        for key in medium.keys()? {
            let Some(raw) = medium.get_item(&key)? else {
                continue;
            };
            stats.total_entries += 1;
            stats.total_size_bytes += raw.len();

            match serde_json::from_str::<RawEntry>(&raw) {
                Ok(entry) if entry.is_fresh(now) => {
                    stats.valid_entries += 1;
                    stats.oldest_entry = Some(
                        stats
                            .oldest_entry
                            .map_or(entry.stored_at, |t| t.min(entry.stored_at)),
                    );
                    stats.newest_entry = Some(
                        stats
                            .newest_entry
                            .map_or(entry.stored_at, |t| t.max(entry.stored_at)),
                    );
                }
                Ok(_) => stats.expired_entries += 1,
                Err(_) => stats.corrupt_entries += 1,
            }
        }

        Ok(stats)
    }

    /// Free space after a quota rejection: expired and corrupt entries first,
    /// then the single oldest entry if nothing was stale.
    fn make_room(&self, medium: &mut dyn StorageMedium) -> usize {
        let now = self.clock.now_ms();
        let Ok(keys) = medium.keys() else {
            return 0;
        };

        let mut removed = 0;
        let mut oldest: Option<(i64, String)> = None;
        for key in keys {
            let parsed = medium
                .get_item(&key)
                .ok()
                .flatten()
                .map(|raw| serde_json::from_str::<RawEntry>(&raw));
            match parsed {
                Some(Ok(entry)) if entry.is_fresh(now) => {
                    if oldest.as_ref().is_none_or(|(t, _)| entry.stored_at < *t) {
                        oldest = Some((entry.stored_at, key));
                    }
                }
                Some(_) => {
                    if medium.remove_item(&key).is_ok() {
                        removed += 1;
                    }
                }
                None => {}
            }
        }

        if removed == 0
            && let Some((_, key)) = oldest
            && medium.remove_item(&key).is_ok()
        {
            removed += 1;
        }
        removed
    }
}

/// Statistics about cache state
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub corrupt_entries: usize,
    pub total_size_bytes: usize,
    /// Epoch millis of the oldest fresh entry
    pub oldest_entry: Option<i64>,
    /// Epoch millis of the newest fresh entry
    pub newest_entry: Option<i64>,
}
