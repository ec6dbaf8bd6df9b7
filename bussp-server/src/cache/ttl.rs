//! TTL cache over a key-value store.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, StorageError};

use super::clock::{Clock, SystemClock};
use super::error::CacheError;

/// Default key namespace.
pub const DEFAULT_PREFIX: &str = "bussp_cache_";

/// Default TTL: 24 hours, the line-data lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the TTL cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix prepended to every key in the store.
    pub prefix: String,

    /// TTL used when `set` is not given one.
    pub default_ttl: Duration,

    /// Maximum number of entries in the namespace.
    pub max_entries: usize,

    /// Maximum total serialized size of the namespace, in bytes.
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL,
            max_entries: 1000,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn with_max_bytes(mut self, n: u64) -> Self {
        self.max_bytes = n;
        self
    }
}

/// Stored form of a cached value. Timestamps are Unix milliseconds.
///
/// `expires_at > stored_at` always holds; an entry is live while
/// `now <= expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: i64,
    pub expires_at: i64,
}

impl<T> CacheEntry<T> {
    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms <= self.expires_at
    }
}

/// Entry timestamps without the payload.
#[derive(Deserialize)]
struct EntryMeta {
    stored_at: i64,
    expires_at: i64,
}

/// Namespace statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    /// Sum of serialized entry lengths in bytes.
    pub total_size: u64,
    /// Expired or undecodable entries not yet removed.
    pub expired_items: usize,
}

/// Storage key → serialized size, least recently used first.
type Recency = LruCache<String, u64>;

/// Expiring, size-bounded cache persisted in a [`KeyValueStore`].
///
/// The cache owns every store key under its prefix. Recency is tracked in
/// memory and seeded from `stored_at` order the first time a write, sweep or
/// clear touches the store.
pub struct TtlCache<S: ?Sized> {
    store: Arc<S>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    /// `None` until seeded. Also serializes writes, sweeps and eviction.
    recency: Mutex<Option<Recency>>,
}

impl<S: KeyValueStore + ?Sized> TtlCache<S> {
    /// Create a cache using the system clock.
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            recency: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    async fn namespaced_keys(&self) -> Result<Vec<String>, CacheError> {
        let keys = self.store.all_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|k| k.starts_with(&self.config.prefix))
            .collect())
    }

    /// Every namespaced entry as `(storage key, raw JSON)`, read
    /// concurrently. Keys removed after listing are skipped.
    async fn namespaced_entries(&self) -> Result<Vec<(String, String)>, CacheError> {
        let reads = self.namespaced_keys().await?.into_iter().map(|storage_key| async move {
            let raw = self.store.get(&storage_key).await?;
            Ok::<_, StorageError>(raw.map(|raw| (storage_key, raw)))
        });
        Ok(try_join_all(reads).await?.into_iter().flatten().collect())
    }

    /// Store `value` under `key`, expiring after `ttl` (or the default TTL).
    ///
    /// A zero TTL is treated as one millisecond. May evict other entries to
    /// stay within the configured bounds.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = self.clock.now_ms();
        let ttl_ms = i64::try_from(ttl.unwrap_or(self.config.default_ttl).as_millis())
            .unwrap_or(i64::MAX)
            .max(1);

        let entry = CacheEntry {
            data: value,
            stored_at: now,
            expires_at: now.saturating_add(ttl_ms),
        };
        let json = serde_json::to_string(&entry)?;
        let size = json.len() as u64;
        let storage_key = self.storage_key(key);

        let mut guard = self.recency.lock().await;
        let recency = self.seeded(&mut guard).await?;

        if let Err(e) = self.store.set(&storage_key, json).await {
            warn!(key, error = %e, "cache set failed");
            return Err(e.into());
        }
        recency.put(storage_key, size);

        self.enforce_bounds(recency, now).await
    }

    /// Fetch a live value.
    ///
    /// Missing, unreadable and undecodable entries are misses. An expired
    /// entry is deleted and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.storage_key(key);

        // Held across the read so a concurrent `set` can't be deleted as the
        // expired entry it replaced.
        let mut guard = self.recency.lock().await;

        let raw = match self.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache get failed");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "undecodable cache entry");
                return None;
            }
        };

        if !entry.is_live(self.clock.now_ms()) {
            if let Err(e) = self.store.remove(&storage_key).await {
                warn!(key, error = %e, "failed to remove expired cache entry");
            }
            if let Some(recency) = guard.as_mut() {
                recency.pop(&storage_key);
            }
            return None;
        }

        if let Some(recency) = guard.as_mut() {
            recency.promote(&storage_key);
        }
        Some(entry.data)
    }

    /// Whether `key` is missing, undecodable or past its expiry.
    pub async fn is_expired(&self, key: &str) -> bool {
        let Ok(Some(raw)) = self.store.get(&self.storage_key(key)).await else {
            return true;
        };
        match serde_json::from_str::<EntryMeta>(&raw) {
            Ok(meta) => self.clock.now_ms() > meta.expires_at,
            Err(_) => true,
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let storage_key = self.storage_key(key);
        let mut guard = self.recency.lock().await;

        self.store.remove(&storage_key).await?;
        if let Some(recency) = guard.as_mut() {
            recency.pop(&storage_key);
        }
        Ok(())
    }

    /// Remove every entry in the namespace. Keys outside it are untouched.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = self.recency.lock().await;

        let keys = self.namespaced_keys().await?;
        self.store.multi_remove(&keys).await?;
        *guard = Some(LruCache::unbounded());

        debug!(removed = keys.len(), "cache cleared");
        Ok(())
    }

    /// Remove expired and undecodable entries. Returns how many were removed.
    pub async fn cleanup(&self) -> Result<usize, CacheError> {
        let mut guard = self.recency.lock().await;
        let recency = self.seeded(&mut guard).await?;
        self.sweep(recency, self.clock.now_ms()).await
    }

    /// Total serialized size of the namespace in bytes.
    pub async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.stats().await?.total_size)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = self.clock.now_ms();
        let mut stats = CacheStats::default();

        for (_, raw) in self.namespaced_entries().await? {
            stats.total_items += 1;
            stats.total_size += raw.len() as u64;

            match serde_json::from_str::<EntryMeta>(&raw) {
                Ok(meta) if now <= meta.expires_at => {}
                _ => stats.expired_items += 1,
            }
        }

        Ok(stats)
    }

    /// Return the recency list, loading it from the store if needed.
    async fn seeded<'a>(
        &self,
        slot: &'a mut Option<Recency>,
    ) -> Result<&'a mut Recency, CacheError> {
        let recency = match slot.take() {
            Some(recency) => recency,
            None => self.load_recency().await?,
        };
        Ok(slot.insert(recency))
    }

    async fn load_recency(&self) -> Result<Recency, CacheError> {
        let mut entries: Vec<_> = self
            .namespaced_entries()
            .await?
            .into_iter()
            .map(|(storage_key, raw)| {
                // Undecodable entries sort first and are evicted first.
                let stored_at = serde_json::from_str::<EntryMeta>(&raw)
                    .map(|m| m.stored_at)
                    .unwrap_or(i64::MIN);
                (stored_at, storage_key, raw.len() as u64)
            })
            .collect();
        entries.sort();

        let mut recency = LruCache::unbounded();
        for (_, storage_key, size) in entries {
            recency.put(storage_key, size);
        }
        Ok(recency)
    }

    async fn sweep(&self, recency: &mut Recency, now: i64) -> Result<usize, CacheError> {
        let mut doomed = Vec::new();
        for (storage_key, raw) in self.namespaced_entries().await? {
            match serde_json::from_str::<EntryMeta>(&raw) {
                Ok(meta) if now <= meta.expires_at => {}
                _ => doomed.push(storage_key),
            }
        }

        if !doomed.is_empty() {
            self.store.multi_remove(&doomed).await?;
            for storage_key in &doomed {
                recency.pop(storage_key);
            }
            debug!(removed = doomed.len(), "swept expired cache entries");
        }
        Ok(doomed.len())
    }

    fn over_capacity(&self, recency: &Recency) -> bool {
        let bytes: u64 = recency.iter().map(|(_, size)| *size).sum();
        recency.len() > self.config.max_entries || bytes > self.config.max_bytes
    }

    /// Sweep expired entries, then evict least recently used ones until the
    /// namespace is within bounds.
    async fn enforce_bounds(&self, recency: &mut Recency, now: i64) -> Result<(), CacheError> {
        if !self.over_capacity(recency) {
            return Ok(());
        }

        let swept = self.sweep(recency, now).await?;
        let mut evicted = 0;
        while self.over_capacity(recency) {
            let Some(storage_key) = recency.peek_lru().map(|(k, _)| k.clone()) else {
                break;
            };
            // Stays tracked until the store has actually dropped it.
            self.store.remove(&storage_key).await?;
            recency.pop(&storage_key);
            evicted += 1;
        }

        debug!(swept, evicted, entries = recency.len(), "cache bounds enforced");
        Ok(())
    }
}
