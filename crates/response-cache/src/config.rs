//! Response cache configuration.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheConfigError {
    #[error("ttl cannot be 0")]
    ZeroTtl,

    #[error("cleanup_interval cannot be 0")]
    ZeroCleanupInterval,
}

/// TTL and eviction cadence for the response cache.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCacheConfig {
    /// Maximum age an entry may reach before it is eligible for eviction.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "ttl_secs")]
    pub ttl: Duration,

    /// Minimum time between eviction passes. Passes only run as part of
    /// `record`, never on a timer.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "cleanup_interval_secs")]
    pub cleanup_interval: Duration,
}

impl ResponseCacheConfig {
    /// Default TTL (100s).
    pub const DEFAULT_TTL: Duration = Duration::from_secs(100);

    /// Default cleanup interval (100s).
    pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(100);

    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.ttl.is_zero() {
            return Err(CacheConfigError::ZeroTtl);
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheConfigError::ZeroCleanupInterval);
        }
        Ok(())
    }
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Self::DEFAULT_TTL,
            cleanup_interval: Self::DEFAULT_CLEANUP_INTERVAL,
        }
    }
}
