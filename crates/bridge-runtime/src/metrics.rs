//! Copies library statistics into the Prometheus registry.

use bridge_telemetry::{
    sync_counter, BUS_MESSAGES_PUBLISHED, CACHE_ENTRIES, CACHE_EVICTIONS, DEADLINE_EXCEEDED,
    DECODE_ERRORS, REQUESTS_SUBMITTED, RESULTS_INGESTED, RESULTS_MALFORMED, RESULTS_RESOLVED,
};
use correlation_bridge::BridgeStats;
use response_cache::{IngestStats, ResponseStore};
use shared_bus::InMemoryBroker;
use std::sync::atomic::Ordering;

/// Sources the sync reads from.
pub struct MetricsSources<'a> {
    pub bridge: &'a BridgeStats,
    pub store: &'a ResponseStore,
    pub ingest: &'a IngestStats,
    pub broker: &'a InMemoryBroker,
    pub topics: &'a [String],
}

/// Bring every exported metric up to date.
pub fn sync_metrics(sources: &MetricsSources<'_>) {
    let bridge = sources.bridge;
    sync_counter(&REQUESTS_SUBMITTED, bridge.submitted.load(Ordering::Relaxed));
    sync_counter(&RESULTS_RESOLVED, bridge.resolved.load(Ordering::Relaxed));
    sync_counter(&DEADLINE_EXCEEDED, bridge.deadline_exceeded.load(Ordering::Relaxed));
    sync_counter(&DECODE_ERRORS, bridge.decode_errors.load(Ordering::Relaxed));

    let store_stats = sources.store.stats();
    CACHE_ENTRIES.set(sources.store.len() as i64);
    sync_counter(&CACHE_EVICTIONS, store_stats.evictions.load(Ordering::Relaxed));

    sync_counter(&RESULTS_INGESTED, sources.ingest.ingested.load(Ordering::Relaxed));
    sync_counter(&RESULTS_MALFORMED, sources.ingest.malformed.load(Ordering::Relaxed));

    // Offsets count every message ever accepted on the topic.
    for topic in sources.topics {
        sync_counter(
            &BUS_MESSAGES_PUBLISHED.with_label_values(&[topic.as_str()]),
            sources.broker.end_offset(topic),
        );
    }
}
