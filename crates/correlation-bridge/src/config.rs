//! Bridge configuration with validation.
//!
//! Durations are carried as milliseconds on the wire and in the
//! environment, except the cache settings which are in seconds.

use response_cache::{CacheConfigError, ResponseCacheConfig};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use shared_bus::topics;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("timeout cannot be 0")]
    ZeroTimeout,

    #[error("poll_interval cannot be 0")]
    ZeroPollInterval,

    #[error("{0} cannot be empty")]
    EmptyTopic(&'static str),

    #[error("request_topic and result_topic must differ")]
    SameRequestAndResultTopic,

    #[error("cache: {0}")]
    Cache(#[from] CacheConfigError),

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// How the bridge observes the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Look the id up directly in the shared store.
    #[default]
    PointLookup,
    /// Read the newest whole-mapping snapshot from the snapshot topic.
    Snapshot,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointLookup => write!(f, "point_lookup"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point_lookup" | "point-lookup" | "lookup" => Ok(Self::PointLookup),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(format!("unknown read mode '{other}'")),
        }
    }
}

/// Main bridge configuration
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Topic prompts are published to.
    pub request_topic: String,
    /// Topic workers publish results to.
    pub result_topic: String,
    /// Topic whole-mapping snapshots are published to.
    pub snapshot_topic: String,
    /// Hard deadline for `submit_and_await`.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Duration,
    /// Delay between polls.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    pub read_mode: ReadMode,
    pub cache: ResponseCacheConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_topic: topics::USER_PROMPT.to_string(),
            result_topic: topics::LLM_RESPONSE.to_string(),
            snapshot_topic: topics::RESPONSE_CACHE.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            read_mode: ReadMode::default(),
            cache: ResponseCacheConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Default wait deadline (300s).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Default poll interval (1s).
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Defaults overlaid with `DREAM_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DREAM_TIMEOUT_MS`: wait deadline (default: 300000)
    /// - `DREAM_POLL_INTERVAL_MS`: poll interval (default: 1000)
    /// - `DREAM_CACHE_TTL_SECS`: response TTL (default: 100)
    /// - `DREAM_CLEANUP_INTERVAL_SECS`: eviction cadence (default: 100)
    /// - `DREAM_READ_MODE`: `point_lookup` or `snapshot` (default: point_lookup)
    /// - `DREAM_REQUEST_TOPIC`, `DREAM_RESULT_TOPIC`, `DREAM_SNAPSHOT_TOPIC`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DREAM_REQUEST_TOPIC") {
            config.request_topic = v;
        }
        if let Some(v) = lookup("DREAM_RESULT_TOPIC") {
            config.result_topic = v;
        }
        if let Some(v) = lookup("DREAM_SNAPSHOT_TOPIC") {
            config.snapshot_topic = v;
        }
        if let Some(ms) = parse_var(&lookup, "DREAM_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "DREAM_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "DREAM_CACHE_TTL_SECS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "DREAM_CLEANUP_INTERVAL_SECS")? {
            config.cache.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(mode) = parse_var(&lookup, "DREAM_READ_MODE")? {
            config.read_mode = mode;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        for (name, topic) in [
            ("request_topic", &self.request_topic),
            ("result_topic", &self.result_topic),
            ("snapshot_topic", &self.snapshot_topic),
        ] {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic(name));
            }
        }
        if self.request_topic == self.result_topic {
            return Err(ConfigError::SameRequestAndResultTopic);
        }

        self.cache.validate()?;
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidEnv {
                var,
                reason: e.to_string(),
                value,
            }),
    }
}
