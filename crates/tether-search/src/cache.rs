//! Epoch-guarded in-memory cache for fused search responses.
//!
//! Keys hash the normalized query and the weight pair; pagination is not
//! part of the key because every entry stores the unpaginated superset.
//! Any mutation that can affect relevance bumps the epoch and drops all
//! entries; a response computed before the bump can no longer be admitted,
//! which closes the race where a search straddles an invalidation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use tether_core::defaults::{CACHE_KEY_PREFIX, CACHE_TTL_SECS};
use tether_core::SearchResponse;

/// Normalize query text for keying and ranking: lowercase, collapse runs
/// of whitespace to single spaces, trim.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Time source, injected so tests can control expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hit/miss counters for monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub rejected_puts: u64,
}

/// In-memory search result cache.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<ResultCacheInner>,
}

struct ResultCacheInner {
    entries: RwLock<HashMap<String, SearchResponse>>,
    epoch: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    rejected_puts: AtomicU64,
}

impl ResultCache {
    /// Create a cache with the default TTL and the system clock.
    pub fn new() -> Self {
        Self::with_clock(
            Duration::from_secs(CACHE_TTL_SECS),
            Arc::new(SystemClock),
        )
    }

    /// Create a cache with an explicit TTL and clock.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ResultCacheInner {
                entries: RwLock::new(HashMap::new()),
                epoch: AtomicU64::new(0),
                ttl,
                clock,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                rejected_puts: AtomicU64::new(0),
            }),
        }
    }

    /// Create from `TETHER_CACHE_TTL` (seconds).
    pub fn from_env() -> Self {
        let ttl: u64 = std::env::var("TETHER_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(CACHE_TTL_SECS);
        Self::with_clock(Duration::from_secs(ttl), Arc::new(SystemClock))
    }

    /// Generate a cache key from the query and weight pair. The query is
    /// normalized first, so equivalent spellings share an entry.
    pub fn cache_key(&self, query: &str, keyword_weight: f32, vector_weight: f32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_query(query).as_bytes());
        hasher.update(keyword_weight.to_bits().to_le_bytes());
        hasher.update(vector_weight.to_bits().to_le_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("{}{}", CACHE_KEY_PREFIX, &hash[..16])
    }

    /// Current invalidation epoch. Read before computing a response and
    /// passed back to [`put`](Self::put).
    pub fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Get a cached response, honoring its expiry.
    pub async fn get(&self, key: &str) -> Option<SearchResponse> {
        let now = self.inner.clock.now();
        {
            let entries = self.inner.entries.read().await;
            if let Some(response) = entries.get(key) {
                if response.expires_at > now {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        subsystem = "cache",
                        component = "result_cache",
                        key = %key,
                        "Cache HIT"
                    );
                    return Some(response.clone());
                }
            }
        }
        // Expired entries are dropped on the way out.
        let mut entries = self.inner.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|response| response.expires_at <= now)
        {
            entries.remove(key);
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            subsystem = "cache",
            component = "result_cache",
            key = %key,
            "Cache MISS"
        );
        None
    }

    /// Admit a response computed at `computed_epoch`.
    ///
    /// Returns false (and stores nothing) when an invalidation has happened
    /// since that epoch was read: the response may rank rows that no longer
    /// exist.
    pub async fn put(&self, key: &str, response: SearchResponse, computed_epoch: u64) -> bool {
        if computed_epoch < self.current_epoch() {
            self.inner.rejected_puts.fetch_add(1, Ordering::Relaxed);
            debug!(
                subsystem = "cache",
                component = "result_cache",
                key = %key,
                cache_epoch = computed_epoch,
                "Stale response rejected"
            );
            return false;
        }
        let mut entries = self.inner.entries.write().await;
        // Re-check under the lock: invalidate_all takes the same lock.
        if computed_epoch < self.current_epoch() {
            self.inner.rejected_puts.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        entries.insert(key.to_string(), response);
        true
    }

    /// Drop every entry and advance the epoch. Idempotent in effect;
    /// each call still bumps the epoch.
    pub async fn invalidate_all(&self) {
        let mut entries = self.inner.entries.write().await;
        let removed = entries.len();
        entries.clear();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            subsystem = "cache",
            component = "result_cache",
            cache_epoch = epoch,
            removed,
            "Cache invalidated"
        );
    }

    /// Remove expired entries. Expiry is already enforced on read; this
    /// just reclaims memory on a maintenance tick.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|_, response| response.expires_at > now);
        before - entries.len()
    }

    /// Expiry timestamp for a response computed now.
    pub fn expiry_for_now(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = self.inner.clock.now();
        let expires = now
            + chrono::Duration::from_std(self.inner.ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(CACHE_TTL_SECS as i64));
        (now, expires)
    }

    /// Number of live entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            rejected_puts: self.inner.rejected_puts.load(Ordering::Relaxed),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
