//! Runtime configuration.

use anyhow::{anyhow, Context, Result};
use correlation_bridge::BridgeConfig;
use std::env;
use std::time::Duration;

/// Everything the `dream-node` binary needs to start.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bridge: BridgeConfig,
    /// Run the in-process echo worker.
    pub echo_worker: bool,
    /// Delay before the echo worker answers.
    pub echo_delay: Duration,
    /// How often library stats are copied into Prometheus.
    pub metrics_sync_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            echo_worker: true,
            echo_delay: Duration::from_secs(1),
            metrics_sync_interval: Duration::from_secs(5),
        }
    }
}

impl RuntimeConfig {
    /// Load from environment variables.
    ///
    /// Bridge settings come from [`BridgeConfig::from_env`]; in addition:
    ///
    /// - `DREAM_ECHO_WORKER`: run the echo worker (default: true)
    /// - `DREAM_ECHO_DELAY_MS`: echo delay (default: 1000)
    /// - `DREAM_METRICS_SYNC_MS`: metrics sync interval (default: 5000)
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            bridge: BridgeConfig::from_env().context("Invalid bridge configuration")?,
            ..Default::default()
        };

        if let Ok(v) = env::var("DREAM_ECHO_WORKER") {
            config.echo_worker = v.to_lowercase() != "false" && v != "0";
        }
        if let Ok(v) = env::var("DREAM_ECHO_DELAY_MS") {
            let ms: u64 = v
                .parse()
                .with_context(|| format!("DREAM_ECHO_DELAY_MS must be milliseconds, got {v:?}"))?;
            config.echo_delay = Duration::from_millis(ms);
        }
        if let Ok(v) = env::var("DREAM_METRICS_SYNC_MS") {
            let ms: u64 = v
                .parse()
                .with_context(|| format!("DREAM_METRICS_SYNC_MS must be milliseconds, got {v:?}"))?;
            if ms == 0 {
                return Err(anyhow!("DREAM_METRICS_SYNC_MS cannot be 0"));
            }
            config.metrics_sync_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
