//! Digest deduplication cache.
//!
//! Gates the scan-findings fetch: a digest recorded here is not queried again
//! until its entry expires. Losing entries (eviction, restart) only costs
//! redundant upstream calls.

use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Reads each entry's expiry from the value stored with it.
struct PerEntryTtl;

impl Expiry<String, Duration> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        ttl: &Duration,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(*ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        ttl: &Duration,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(*ttl)
    }
}

/// Time-bounded set of already-processed digests.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct DedupCache {
    cache: Cache<String, Duration>,
}

impl DedupCache {
    /// Creates a cache holding at most `capacity` digests.
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Returns true if the key is present and unexpired.
    pub async fn has(&self, key: &str) -> bool {
        self.cache.get(key).await.is_some()
    }

    /// Records the key for `ttl`, replacing any previous expiry.
    pub async fn set_with_expiry(&self, key: impl Into<String>, ttl: Duration) {
        self.cache.insert(key.into(), ttl).await;
    }

    /// Approximate number of live entries.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
