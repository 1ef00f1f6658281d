//! Prometheus metrics for the dream bridge.
//!
//! All metrics follow the naming convention: `dream_<component>_<metric>_<unit>`
//!
//! Library crates keep their own atomic counters; the runtime copies them
//! here with [`sync_counter`] / gauges, so nothing below the composition
//! root depends on this crate.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BRIDGE METRICS
    // =========================================================================

    /// Requests published by the bridge
    pub static ref REQUESTS_SUBMITTED: IntCounter = IntCounter::new(
        "dream_bridge_requests_submitted_total",
        "Total requests published by the bridge"
    ).expect("metric creation failed");

    /// Waits that returned a result
    pub static ref RESULTS_RESOLVED: IntCounter = IntCounter::new(
        "dream_bridge_results_resolved_total",
        "Total waits that returned a result"
    ).expect("metric creation failed");

    /// Waits that hit their deadline
    pub static ref DEADLINE_EXCEEDED: IntCounter = IntCounter::new(
        "dream_bridge_deadline_exceeded_total",
        "Total waits that ended without a result"
    ).expect("metric creation failed");

    /// Transient read failures while polling
    pub static ref DECODE_ERRORS: IntCounter = IntCounter::new(
        "dream_bridge_decode_errors_total",
        "Total transient state read failures while polling"
    ).expect("metric creation failed");

    /// Time from submit to result (or deadline)
    pub static ref WAIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dream_bridge_wait_duration_seconds",
            "Time spent waiting for a result"
        ).buckets(exponential_buckets(0.01, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // CACHE METRICS
    // =========================================================================

    /// Current number of cached responses
    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::new(
        "dream_cache_entries",
        "Number of responses currently cached"
    ).expect("metric creation failed");

    /// Entries removed by eviction passes
    pub static ref CACHE_EVICTIONS: IntCounter = IntCounter::new(
        "dream_cache_evictions_total",
        "Total responses evicted past their TTL"
    ).expect("metric creation failed");

    /// Results merged into the cache from the bus
    pub static ref RESULTS_INGESTED: IntCounter = IntCounter::new(
        "dream_ingest_results_total",
        "Total results merged into the response cache"
    ).expect("metric creation failed");

    /// Result messages that could not be decoded
    pub static ref RESULTS_MALFORMED: IntCounter = IntCounter::new(
        "dream_ingest_malformed_total",
        "Total result messages that failed to decode"
    ).expect("metric creation failed");

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Messages published per topic
    pub static ref BUS_MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("dream_bus_messages_published_total", "Messages published to the bus"),
        &["topic"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Calling it again is a no-op.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bridge
        Box::new(REQUESTS_SUBMITTED.clone()),
        Box::new(RESULTS_RESOLVED.clone()),
        Box::new(DEADLINE_EXCEEDED.clone()),
        Box::new(DECODE_ERRORS.clone()),
        Box::new(WAIT_DURATION.clone()),
        // Cache
        Box::new(CACHE_ENTRIES.clone()),
        Box::new(CACHE_EVICTIONS.clone()),
        Box::new(RESULTS_INGESTED.clone()),
        Box::new(RESULTS_MALFORMED.clone()),
        // Bus
        Box::new(BUS_MESSAGES_PUBLISHED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Raise `counter` to `total`, a monotonic count kept elsewhere.
///
/// Totals below the current value are ignored.
pub fn sync_counter(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
