//! # Response Cache
//!
//! Single-owner map from correlation id to result, with lazy TTL eviction.
//!
//! ## Eviction Design
//!
//! - Entries are stamped with the time they are merged, not the time the
//!   worker produced them
//! - An eviction pass runs inside `record` once `cleanup_interval` has
//!   passed since the previous pass; there is no background timer
//! - After a pass at `now`, no entry older than `ttl` remains

use crate::config::ResponseCacheConfig;
use chrono::{DateTime, TimeDelta, Utc};
use shared_types::{CorrelationId, ResultEntry};
use std::collections::HashMap;
use std::time::Duration;

/// What a single `record` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    /// An entry for the same id was replaced.
    pub overwritten: bool,
    /// Whether an eviction pass ran as part of this call.
    pub cleanup_ran: bool,
    /// Entries removed by that pass.
    pub evicted: usize,
}

/// Time-bounded result cache.
///
/// Not synchronized; [`ResponseStore`](crate::ResponseStore) wraps it for
/// shared use.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    /// Map of correlation id -> entry.
    entries: HashMap<CorrelationId, ResultEntry>,

    /// Maximum entry age.
    ttl: Duration,

    /// Minimum time between eviction passes.
    cleanup_interval: Duration,

    /// When the last eviction pass ran.
    last_cleanup: DateTime<Utc>,

    /// Latest time seen by any call; used so a wall clock stepping
    /// backwards never makes an age shrink.
    high_water: DateTime<Utc>,
}

impl ResponseCache {
    /// Create a cache with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&ResponseCacheConfig::default())
    }

    /// Create a cache with custom settings.
    #[must_use]
    pub fn with_config(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self::with_config_at(ttl, cleanup_interval, Utc::now())
    }

    /// Create a cache whose cleanup clock starts at `now`.
    #[must_use]
    pub fn with_config_at(ttl: Duration, cleanup_interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            cleanup_interval,
            last_cleanup: now,
            high_water: now,
        }
    }

    #[must_use]
    pub fn from_config(config: &ResponseCacheConfig) -> Self {
        Self::with_config(config.ttl, config.cleanup_interval)
    }

    /// Insert or overwrite the entry for `id`, stamped with the current time.
    pub fn record(&mut self, id: CorrelationId, value: serde_json::Value) -> RecordOutcome {
        self.record_at(id, value, Utc::now())
    }

    /// Insert or overwrite the entry for `id`, stamped with `now`.
    ///
    /// Last write wins. Runs an eviction pass afterwards if the cleanup
    /// interval has elapsed.
    pub fn record_at(
        &mut self,
        id: CorrelationId,
        value: serde_json::Value,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let now = self.advance(now);
        let overwritten = self
            .entries
            .insert(id, ResultEntry::new(id, value, now))
            .is_some();

        let mut outcome = RecordOutcome {
            overwritten,
            ..RecordOutcome::default()
        };

        if now.signed_duration_since(self.last_cleanup) >= to_delta(self.cleanup_interval) {
            outcome.evicted = self.evict_expired(now, self.ttl);
            outcome.cleanup_ran = true;
        }

        outcome
    }

    /// Entry for `id`, if recorded and not yet evicted.
    #[must_use]
    pub fn lookup(&self, id: &CorrelationId) -> Option<&ResultEntry> {
        self.entries.get(id)
    }

    /// Remove every entry older than `ttl` at `now`. Returns how many were
    /// removed.
    ///
    /// Counts as a cleanup pass: the next lazy pass in `record` is due one
    /// `cleanup_interval` after this one.
    pub fn evict_expired(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let now = self.advance(now);
        let ttl = to_delta(ttl);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age(now) <= ttl);
        self.last_cleanup = now;
        before - self.entries.len()
    }

    /// Check if an entry exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    #[must_use]
    pub fn last_cleanup(&self) -> DateTime<Utc> {
        self.last_cleanup
    }

    fn advance(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if now > self.high_water {
            self.high_water = now;
        }
        self.high_water
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
