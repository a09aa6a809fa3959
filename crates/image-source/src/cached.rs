//! Caching decorator for sources
//!
//! [`Cached`] wraps any [`Source`] and keeps fetch results in a shared,
//! cost-bounded [`ResultCache`] keyed by `(ImageId, source name)`. Concurrent
//! misses for the same key are coalesced so the wrapped source runs once and
//! every caller receives the same result.

use crate::cost::result_cost;
use crate::flight::{Flight, SingleFlight};
use crate::source::{Capabilities, FetchResult, ReadSeek, Source, SourceError};
use crate::types::{ImageId, Size};
use moka::sync::Cache;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for the shared result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total estimated bytes of decoded images kept in memory
    pub max_cost: u64,
    /// Lifetime of a cached image or negative result
    #[serde(with = "crate::config::duration_secs")]
    pub ttl: Duration,
    /// Lifetime of a cached failure, so broken files are retried sooner
    #[serde(with = "crate::config::duration_secs")]
    pub error_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: 256_000_000,             // 256MB
            ttl: Duration::from_secs(10 * 60), // 10 minutes
            error_ttl: Duration::from_secs(30),
        }
    }
}

/// Cache key: one image as produced by one named source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: ImageId,
    pub source: Arc<str>,
}

impl CacheKey {
    pub fn new(id: ImageId, source: Arc<str>) -> Self {
        Self { id, source }
    }
}

struct ResultExpiry {
    ttl: Duration,
    error_ttl: Duration,
}

impl Expiry<CacheKey, FetchResult> for ResultExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &FetchResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        if value.error.is_some() {
            Some(self.error_ttl.min(self.ttl))
        } else {
            Some(self.ttl)
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
}

/// Shared, cost-bounded store of fetch results with per-key coalescing
///
/// Cheap to clone; clones share the same entries, counters and in-flight table.
#[derive(Clone)]
pub struct ResultCache {
    entries: Cache<CacheKey, FetchResult>,
    flights: Arc<SingleFlight<CacheKey, FetchResult>>,
    counters: Arc<Counters>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_cost)
            .weigher(|_key: &CacheKey, value: &FetchResult| -> u32 {
                result_cost(value).min(u32::MAX as u64) as u32
            })
            .expire_after(ResultExpiry {
                ttl: config.ttl,
                error_ttl: config.error_ttl,
            })
            .build();

        Self {
            entries,
            flights: Arc::new(SingleFlight::new()),
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &CacheKey) -> Option<FetchResult> {
        let found = self.entries.get(key);
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: CacheKey, result: FetchResult) {
        self.entries.insert(key, result);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.invalidate(key);
    }

    /// Drop every entry; in-flight fetches still complete
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Fetch through the cache, running `fetch` at most once per key at a time
    pub fn get_or_fetch<F>(&self, key: CacheKey, fetch: F) -> FetchResult
    where
        F: FnOnce() -> FetchResult,
    {
        if let Some(mut hit) = self.get(&key) {
            hit.from_cache = true;
            return hit;
        }
        self.fetch_coalesced(key, fetch)
    }

    /// Lead or join the in-flight fetch for `key`
    ///
    /// A leader looks the key up again first: a previous leader may have
    /// stored its result and left between our miss and taking the slot.
    fn fetch_coalesced<F>(&self, key: CacheKey, fetch: F) -> FetchResult
    where
        F: FnOnce() -> FetchResult,
    {
        let (mut result, flight) = self.flights.run(&key, || {
            if let Some(mut stored) = self.entries.get(&key) {
                stored.from_cache = true;
                return stored;
            }
            let mut fresh = fetch();
            fresh.from_cache = false;
            self.insert(key.clone(), fresh.clone());
            fresh
        });

        if flight == Flight::Joined {
            debug!(id = %key.id, source = %key.source, "joined in-flight fetch");
            self.counters.joins.fetch_add(1, Ordering::Relaxed);
            result.from_cache = true;
        }
        result
    }

    /// Snapshot of cache statistics for monitoring and debugging
    pub fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks();
        CacheStats {
            entries: self.entries.entry_count(),
            cost: self.entries.weighted_size(),
            max_cost: self.config.max_cost,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            in_flight: self.flights.in_flight(),
        }
    }
}

/// Cache statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub cost: u64,
    pub max_cost: u64,
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub in_flight: usize,
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

    pub fn usage_percent(&self) -> f64 {
        if self.max_cost == 0 {
            0.0
        } else {
            (self.cost as f64 / self.max_cost as f64) * 100.0
        }
    }
}

/// A source whose results are cached and whose concurrent misses are coalesced
pub struct Cached {
    source: Arc<dyn Source>,
    name: Arc<str>,
    cache: ResultCache,
    capabilities: Capabilities,
}

impl Cached {
    pub fn new(source: Arc<dyn Source>, cache: ResultCache) -> Self {
        let name: Arc<str> = Arc::from(source.name());
        let capabilities = source.capabilities() | Capabilities::GET | Capabilities::SET;
        Self {
            source,
            name,
            cache,
            capabilities,
        }
    }

    pub fn inner(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn key(&self, id: ImageId) -> CacheKey {
        CacheKey::new(id, Arc::clone(&self.name))
    }
}

impl Source for Cached {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        self.source.display_name()
    }

    fn size(&self, original: Size) -> Size {
        self.source.size(original)
    }

    fn duration_estimate(&self, size: Size) -> Duration {
        self.source.duration_estimate(size)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn exists(&self, id: ImageId, path: &Path) -> bool {
        self.source.exists(id, path)
    }

    fn get(&self, id: ImageId, path: &Path) -> FetchResult {
        self.cache
            .get_or_fetch(self.key(id), || self.source.get(id, path))
    }

    fn reader(&self, id: ImageId, path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
        self.source.reader(id, path)
    }

    fn decode(&self, reader: &mut dyn ReadSeek) -> FetchResult {
        self.source.decode(reader)
    }

    /// Seed the cache with a result computed elsewhere
    fn set(&self, id: ImageId, _path: &Path, result: &FetchResult) -> bool {
        let mut stored = result.clone();
        stored.from_cache = false;
        self.cache.insert(self.key(id), stored);
        true
    }

    fn close(&self) -> Result<(), SourceError> {
        self.cache.clear();
        self.source.close()
    }
}
