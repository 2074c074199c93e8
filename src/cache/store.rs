//! TTL + LRU cache store with optional durable persistence.

use super::persist::{PersistedEntry, Persistence};
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    stored_at: SystemTime,
    ttl: Duration,
    last_accessed: SystemTime,
}

impl<T> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            data,
            stored_at: now,
            ttl,
            last_accessed: now,
        }
    }

    fn is_expired(&self) -> bool {
        // A clock stepped backwards reads as "not expired"; the sweep will
        // catch the entry once the clock moves past stored_at + ttl again.
        SystemTime::now()
            .duration_since(self.stored_at)
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }
}

/// Store configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without an explicit one.
    pub default_ttl: Duration,
    /// Maximum number of entries; inserting beyond it evicts the
    /// least-recently-accessed entry.
    pub capacity: usize,
    /// Interval of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Label used in log output.
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            capacity: 100,
            sweep_interval: Duration::from_secs(5 * 60),
            name: "cache".to_string(),
        }
    }
}

impl CacheConfig {
    /// Preset for request-scoped data: 5 minute TTL, 100 entries.
    pub fn short_term() -> Self {
        Self {
            name: "short-term".to_string(),
            ..Self::default()
        }
    }

    /// Preset for rarely-changing data: 30 minute TTL, 50 entries.
    pub fn long_term() -> Self {
        Self {
            default_ttl: Duration::from_secs(30 * 60),
            capacity: 50,
            name: "long-term".to_string(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Point-in-time store statistics.
///
/// Expiry counts are computed by scanning all entries at call time; hit and
/// miss totals are genuine counters accumulated across the store's lifetime.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_items: usize,
    pub expired_items: usize,
    pub valid_items: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

/// Options for [`CacheStore::warmup`].
#[derive(Debug, Clone)]
pub struct WarmupOptions {
    /// Maximum number of simultaneous producer calls.
    pub concurrency: usize,
    /// TTL for warmed entries; the store default when `None`.
    pub ttl: Option<Duration>,
}

impl Default for WarmupOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            ttl: None,
        }
    }
}

/// Key-value store with per-entry TTL, LRU eviction at a fixed capacity and an
/// optional durable mirror.
///
/// All mutation goes through the methods below; entries never leave the store
/// by reference, callers get clones. Recency is tracked per entry and
/// refreshed on `get` (but not `has`). A background sweep, started with
/// [`CacheStore::start_sweeper`], removes expired entries on a fixed interval
/// until [`CacheStore::shutdown`] cancels it.
pub struct CacheStore<T> {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    counters: Counters,
    persistence: Option<Box<dyn Persistence<T>>>,
    sweep_token: CancellationToken,
    sweeper_started: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> CacheStore<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            counters: Counters::new(),
            persistence: None,
            sweep_token: CancellationToken::new(),
            sweeper_started: AtomicBool::new(false),
        }
    }

    /// Creates a store mirrored to `persistence`, rehydrating any non-expired
    /// entries from a previous run. A failed load is logged and treated as an
    /// empty snapshot.
    pub fn with_persistence(config: CacheConfig, persistence: Box<dyn Persistence<T>>) -> Self {
        let mut entries = HashMap::new();
        match persistence.load() {
            Ok(persisted) => {
                for p in persisted {
                    let entry = CacheEntry {
                        data: p.data,
                        stored_at: p.stored_at,
                        ttl: p.ttl,
                        last_accessed: p.last_accessed,
                    };
                    if !entry.is_expired() {
                        entries.insert(p.key, entry);
                    }
                }
            }
            Err(err) => {
                warn!(
                    cache = %config.name,
                    backend = persistence.name(),
                    error = %err,
                    "failed to load persisted cache, starting empty"
                );
            }
        }
        Self {
            config,
            entries: RwLock::new(entries),
            counters: Counters::new(),
            persistence: Some(persistence),
            sweep_token: CancellationToken::new(),
            sweeper_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Inserts or overwrites an entry. When the store is full and the key is
    /// new, the least-recently-accessed entry is evicted first.
    pub fn set(&self, key: &str, data: T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.config.capacity && !entries.contains_key(key) {
            Self::evict_one(&mut entries, &self.config.name);
        }
        entries.insert(key.to_string(), CacheEntry::new(data, ttl));
        self.persist_snapshot(&entries);
    }

    /// Returns the entry's data if present and not expired, refreshing its
    /// recency. Expired entries are deleted on the spot.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired() {
                entries.remove(key);
                self.persist_snapshot(&entries);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            entry.last_accessed = SystemTime::now();
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.data.clone());
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Existence probe with the same expiry semantics as `get`, but without a
    /// recency refresh or hit/miss accounting.
    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap();
        let expired = matches!(entries.get(key), Some(entry) if entry.is_expired());
        if expired {
            entries.remove(key);
            self.persist_snapshot(&entries);
            return false;
        }
        entries.contains_key(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap();
        let removed = entries.remove(key).is_some();
        if removed {
            self.persist_snapshot(&entries);
        }
        removed
    }

    /// Removes all entries and clears the persistence mirror.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.clear() {
                warn!(
                    cache = %self.config.name,
                    backend = persistence.name(),
                    error = %err,
                    "failed to clear cache persistence"
                );
            }
        }
    }

    /// Removes every entry whose key starts with `prefix`, returning how many
    /// were dropped. Used to invalidate cached reads after a mutation.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist_snapshot(&entries);
        }
        removed
    }

    /// Removes all expired entries, returning how many were dropped. Also run
    /// periodically by the background sweeper.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            self.persist_snapshot(&entries);
            debug!(cache = %self.config.name, removed, "swept expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap();
        let expired = entries.values().filter(|e| e.is_expired()).count();
        CacheStats {
            total_items: entries.len(),
            expired_items: expired,
            valid_items: entries.len() - expired,
            max_size: self.config.capacity,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Returns the cached value for `key`, or invokes `producer` exactly once,
    /// stores its result and returns it. A producer failure propagates and
    /// nothing is cached.
    pub async fn get_or_set<F, Fut>(&self, key: &str, producer: F, ttl: Option<Duration>) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(data) = self.get(key) {
            return Ok(data);
        }
        let data = producer().await?;
        self.set(key, data.clone(), ttl);
        Ok(data)
    }

    /// Pre-populates the store for keys that are currently absent or expired.
    ///
    /// Keys are fetched in chunks of `options.concurrency`; individual
    /// producer failures are logged and skipped without aborting the batch.
    pub async fn warmup<F, Fut>(&self, keys: &[String], producer: F, options: WarmupOptions)
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let concurrency = options.concurrency.max(1);
        for chunk in keys.chunks(concurrency) {
            let fetches = chunk
                .iter()
                .filter(|key| !self.has(key.as_str()))
                .map(|key| {
                    let fut = producer(key.clone());
                    async move { (key, fut.await) }
                })
                .collect::<Vec<_>>();
            for (key, result) in futures::future::join_all(fetches).await {
                match result {
                    Ok(data) => self.set(key, data, options.ttl),
                    Err(err) => {
                        warn!(cache = %self.config.name, key = %key, error = %err, "cache warmup fetch failed");
                    }
                }
            }
        }
    }

    /// Fetches several keys at once; absent or expired keys are simply missing
    /// from the result.
    pub fn get_batch(&self, keys: &[String]) -> HashMap<String, T> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(data) = self.get(key) {
                found.insert(key.clone(), data);
            }
        }
        found
    }

    /// Stores several entries with a shared TTL.
    pub fn set_batch<I>(&self, items: I, ttl: Option<Duration>)
    where
        I: IntoIterator<Item = (String, T)>,
    {
        for (key, data) in items {
            self.set(&key, data, ttl);
        }
    }

    /// Spawns the background expiry sweep. Idempotent; the task runs until
    /// [`CacheStore::shutdown`] (or dropping the store) cancels it.
    pub fn start_sweeper(self: Arc<Self>) {
        if self.sweeper_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let token = self.sweep_token.clone();
        let period = self.config.sweep_interval;
        let name = self.config.name.clone();
        // The task holds a weak reference so an abandoned store can still be
        // dropped; the drop cancels the token and ends the task.
        let store = Arc::downgrade(&self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // the first tick completes immediately
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match store.upgrade() {
                            Some(store) => {
                                store.cleanup();
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!(cache = %name, "cache sweeper stopped");
        });
    }

    /// Cancels the background sweeper.
    pub fn shutdown(&self) {
        self.sweep_token.cancel();
    }

    fn evict_one(entries: &mut HashMap<String, CacheEntry<T>>, name: &str) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!(cache = %name, key = %key, "evicting least-recently-accessed entry");
            entries.remove(&key);
        }
    }

    fn persist_snapshot(&self, entries: &HashMap<String, CacheEntry<T>>) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot: Vec<PersistedEntry<T>> = entries
            .iter()
            .map(|(key, entry)| PersistedEntry {
                key: key.clone(),
                data: entry.data.clone(),
                stored_at: entry.stored_at,
                ttl: entry.ttl,
                last_accessed: entry.last_accessed,
            })
            .collect();
        if let Err(err) = persistence.save(&snapshot) {
            warn!(
                cache = %self.config.name,
                backend = persistence.name(),
                error = %err,
                "cache persistence save failed"
            );
        }
    }
}

impl<T> Drop for CacheStore<T> {
    fn drop(&mut self) {
        self.sweep_token.cancel();
    }
}
