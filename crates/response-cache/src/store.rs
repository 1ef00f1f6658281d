//! Shared response store.
//!
//! One coarse lock around a [`ResponseCache`]. `record`, `evict_expired`,
//! `lookup` and `snapshot` are mutually exclusive; none of them hold the
//! lock across an await.

use crate::cache::{RecordOutcome, ResponseCache};
use crate::config::ResponseCacheConfig;
use crate::snapshot::ResponseSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared_types::{CorrelationId, ResultEntry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::debug;

/// Statistics for the response store
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Total `record` calls
    pub records: AtomicU64,
    /// Records that replaced an existing entry
    pub overwrites: AtomicU64,
    /// Entries removed by eviction passes
    pub evictions: AtomicU64,
    /// Eviction passes run
    pub cleanup_passes: AtomicU64,
}

/// Response store shared between the ingestion path and every waiter.
///
/// Constructed once by the composition root and passed around as
/// `Arc<ResponseStore>`.
pub struct ResponseStore {
    cache: Mutex<ResponseCache>,
    /// Woken on every `record`.
    changed: Notify,
    stats: StoreStats,
}

impl ResponseStore {
    pub fn new(config: &ResponseCacheConfig) -> Self {
        Self::from_cache(ResponseCache::from_config(config))
    }

    /// Wrap an existing cache (useful for tests with a fixed clock).
    pub fn from_cache(cache: ResponseCache) -> Self {
        Self {
            cache: Mutex::new(cache),
            changed: Notify::new(),
            stats: StoreStats::default(),
        }
    }

    /// Insert or overwrite the result for `id`, stamped now.
    pub fn record(&self, id: CorrelationId, value: serde_json::Value) -> RecordOutcome {
        self.record_at(id, value, Utc::now())
    }

    /// Insert or overwrite the result for `id`, stamped `now`.
    pub fn record_at(
        &self,
        id: CorrelationId,
        value: serde_json::Value,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let outcome = self.cache.lock().record_at(id, value, now);

        self.stats.records.fetch_add(1, Ordering::Relaxed);
        if outcome.overwritten {
            self.stats.overwrites.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.cleanup_ran {
            self.stats.cleanup_passes.fetch_add(1, Ordering::Relaxed);
            self.stats
                .evictions
                .fetch_add(outcome.evicted as u64, Ordering::Relaxed);
            if outcome.evicted > 0 {
                debug!(evicted = outcome.evicted, "Evicted expired responses");
            }
        }

        debug!(
            correlation_id = %id,
            overwritten = outcome.overwritten,
            "Recorded response"
        );

        self.changed.notify_waiters();
        outcome
    }

    /// Copy of the entry for `id`, if present.
    pub fn lookup(&self, id: &CorrelationId) -> Option<ResultEntry> {
        self.cache.lock().lookup(id).cloned()
    }

    /// Remove every entry older than `ttl` at `now`.
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let evicted = self.cache.lock().evict_expired(now, ttl);
        self.stats.cleanup_passes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Whole current mapping, for publishing as a snapshot.
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot::from_entries(self.cache.lock().entries().cloned())
    }

    /// Resolves on the next `record`.
    ///
    /// Only records that happen after this future is first polled (or
    /// `enable`d) are observed.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Get number of cached responses
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.cache.lock().ttl()
    }

    /// Get statistics
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new(&ResponseCacheConfig::default())
    }
}
