//! # Snapshot-mode Flows
//!
//! The ingestor republishes the whole store on the snapshot topic after
//! every result; the bridge polls the newest snapshot instead of the store.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{spawn_worker, test_config, Pipeline};
    use chrono::{TimeDelta, Utc};
    use correlation_bridge::{BridgeError, ReadMode};
    use serde_json::json;
    use shared_bus::Publisher;
    use shared_types::{BusEnvelope, CorrelationId, ResultEntry};
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn snapshot_pipeline() -> Pipeline {
        Pipeline::start(test_config(ReadMode::Snapshot, Duration::from_millis(100)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_round_trip() {
        let pipeline = snapshot_pipeline();
        let _worker = spawn_worker(
            pipeline.broker.clone(),
            &pipeline.config,
            || Duration::from_secs(1),
            |_| json!("world"),
        );

        let start = Instant::now();
        let value = pipeline
            .bridge
            .submit_and_await(json!({"prompt": "hello"}), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(value, json!("world"));
        // No change hint in this mode: resolution lands on a poll tick.
        assert!(start.elapsed() <= Duration::from_millis(1100));
        assert_eq!(pipeline.ingest_stats.snapshots_published.load(Ordering::Relaxed), 1);
        assert_eq!(pipeline.broker.end_offset(&pipeline.config.snapshot_topic), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_share_snapshots() {
        let pipeline = snapshot_pipeline();
        let _worker = spawn_worker(
            pipeline.broker.clone(),
            &pipeline.config,
            || Duration::from_millis(300),
            |payload| payload["n"].clone(),
        );

        let mut handles = Vec::new();
        for n in 0..20 {
            let bridge = pipeline.bridge.clone();
            handles.push(tokio::spawn(async move {
                let value = bridge
                    .submit_and_await(json!({ "n": n }), Duration::from_secs(5))
                    .await
                    .unwrap();
                (n, value)
            }));
        }

        for handle in handles {
            let (n, value) = handle.await.unwrap();
            assert_eq!(value, json!(n));
        }
        assert_eq!(pipeline.ingest_stats.snapshots_published.load(Ordering::Relaxed), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_snapshot_yet_times_out() {
        let pipeline = snapshot_pipeline();

        let err = pipeline
            .bridge
            .await_result(CorrelationId::new(), Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(pipeline.bridge.stats().decode_errors.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_snapshot_aborts_wait() {
        let pipeline = snapshot_pipeline();
        let topic = pipeline.config.snapshot_topic.clone();

        // One entry filed under somebody else's id.
        let filed_under = CorrelationId::new();
        let mut entries = BTreeMap::new();
        entries.insert(
            filed_under.to_string(),
            ResultEntry::new(CorrelationId::new(), json!("misfiled"), Utc::now()),
        );
        let bytes = BusEnvelope::new(topic.as_str(), entries).encode().unwrap();
        pipeline.broker.publish(&topic, None, bytes).await.unwrap();

        let start = Instant::now();
        let err = pipeline
            .bridge
            .await_result(filed_under, Duration::from_secs(5), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BridgeError::StoreCorruption { correlation_id, .. } if correlation_id == filed_under
        ));
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retryable());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_snapshot_is_transient() {
        let pipeline = snapshot_pipeline();
        let topic = pipeline.config.snapshot_topic.clone();
        pipeline.broker.publish(&topic, None, b"{{{".to_vec()).await.unwrap();

        let id = pipeline.bridge.submit(json!({"prompt": "x"})).await.unwrap();
        let bridge = pipeline.bridge.clone();
        let waiter = tokio::spawn(async move {
            bridge
                .await_result(id, Duration::from_secs(5), Duration::from_millis(100))
                .await
        });

        tokio::time::sleep(Duration::from_millis(450)).await;
        pipeline.publish_result(id, json!("recovered")).await;

        assert_eq!(waiter.await.unwrap().unwrap(), json!("recovered"));
        assert!(pipeline.bridge.stats().decode_errors.load(Ordering::Relaxed) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_before_next_snapshot_times_out() {
        let pipeline = snapshot_pipeline();
        let ttl = pipeline.config.cache.ttl;

        let evicted = CorrelationId::new();
        pipeline.store.record(evicted, json!("gone"));
        let past_ttl = Utc::now() + TimeDelta::seconds(ttl.as_secs() as i64 + 1);
        assert_eq!(pipeline.store.evict_expired(past_ttl, ttl), 1);

        // The next snapshot is built from the store without the evicted id.
        let other = CorrelationId::new();
        pipeline.publish_result(other, json!("kept")).await;

        let err = pipeline
            .bridge
            .await_result(evicted, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());

        let value = pipeline
            .bridge
            .await_result(other, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(value, json!("kept"));
    }
}
