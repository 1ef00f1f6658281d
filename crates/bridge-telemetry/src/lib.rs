//! # Bridge Telemetry
//!
//! Structured logging and Prometheus metrics for the dream bridge.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `dream-bridge` | Service name in logs |
//! | `DREAM_LOG_LEVEL`, else `RUST_LOG` | `info` | Log level filter |
//! | `DREAM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `DREAM_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use metrics::{
    encode_metrics, register_metrics, sync_counter, HistogramTimer, BUS_MESSAGES_PUBLISHED,
    CACHE_ENTRIES, CACHE_EVICTIONS, DEADLINE_EXCEEDED, DECODE_ERRORS, REGISTRY,
    REQUESTS_SUBMITTED, RESULTS_INGESTED, RESULTS_MALFORMED, RESULTS_RESOLVED, WAIT_DURATION,
};
pub use tracing_setup::{env_filter, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and the global tracing subscriber.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (synchronous, idempotent)
    register_metrics()?;
    init_tracing(config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
