//! # Request/Result Flows (point-lookup mode)
//!
//! End-to-end flows through broker, ingestor, store and bridge, with a
//! worker answering on the bus.
//!
//! ```text
//! bridge.submit ──► user_prompt ──► worker ──► llm_response ──► ingestor ──► store
//!        ▲                                                                     │
//!        └───────────────────────────── poll ◄─────────────────────────────────┘
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{spawn_worker, test_config, Pipeline};
    use chrono::{TimeDelta, Utc};
    use correlation_bridge::{BridgeError, ReadMode};
    use rand::Rng;
    use serde_json::json;
    use shared_bus::Publisher;
    use shared_types::CorrelationId;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn point_pipeline(poll_ms: u64) -> Pipeline {
        Pipeline::start(test_config(ReadMode::PointLookup, Duration::from_millis(poll_ms)))
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_hello_world_resolves_after_worker_delay() {
        let pipeline = point_pipeline(100);
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
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed <= Duration::from_millis(1100), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_recorded_before_polling_returns_immediately() {
        let pipeline = Pipeline::start(test_config(ReadMode::PointLookup, Duration::from_secs(1)));

        let id = CorrelationId::new();
        pipeline.store.record(id, json!({"answer": 42}));

        let start = Instant::now();
        let value = pipeline
            .bridge
            .await_result(id, Duration::from_secs(5), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(value, json!({"answer": 42}));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(pipeline.bridge.stats().polls.load(Ordering::Relaxed), 1);
    }

    // =========================================================================
    // CONCURRENCY
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_hundred_concurrent_requests_do_not_cross_talk() {
        let pipeline = point_pipeline(100);
        let _worker = spawn_worker(
            pipeline.broker.clone(),
            &pipeline.config,
            || Duration::from_millis(rand::thread_rng().gen_range(200..=1000)),
            |payload| json!({ "echo": payload }),
        );

        let start = Instant::now();
        let mut handles = Vec::new();
        for i in 0..100 {
            let bridge = pipeline.bridge.clone();
            handles.push(tokio::spawn(async move {
                let payload = json!({ "prompt": format!("prompt-{i}") });
                let value = bridge
                    .submit_and_await(payload.clone(), Duration::from_secs(5))
                    .await
                    .unwrap();
                (payload, value)
            }));
        }

        for handle in handles {
            let (payload, value) = handle.await.unwrap();
            assert_eq!(value, json!({ "echo": payload }));
        }

        // Waits overlap: the whole batch costs about one worst-case delay.
        assert!(start.elapsed() <= Duration::from_millis(1200));

        let stats = pipeline.bridge.stats();
        assert_eq!(stats.submitted.load(Ordering::Relaxed), 100);
        assert_eq!(stats.resolved.load(Ordering::Relaxed), 100);
        assert_eq!(pipeline.store.len(), 100);
    }

    // =========================================================================
    // DEADLINES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_no_worker_times_out_at_deadline() {
        let pipeline = Pipeline::start(test_config(ReadMode::PointLookup, Duration::from_secs(1)));

        let start = Instant::now();
        let err = pipeline
            .bridge
            .submit_and_await(json!({"prompt": "anyone?"}), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(err.status_code(), 408);
        assert!(err.is_retryable());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(pipeline.bridge.stats().deadline_exceeded.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_is_retained_for_a_later_wait() {
        let pipeline = point_pipeline(100);
        let _worker = spawn_worker(
            pipeline.broker.clone(),
            &pipeline.config,
            || Duration::from_secs(3),
            |_| json!("late"),
        );

        let id = pipeline.bridge.submit(json!({"prompt": "slow"})).await.unwrap();
        let err = pipeline
            .bridge
            .await_result(id, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::DeadlineExceeded { correlation_id, .. } if correlation_id == id
        ));

        // The answer lands after the caller gave up and stays until TTL.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(pipeline.store.lookup(&id).is_some());

        let value = pipeline
            .bridge
            .await_result(id, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(value, json!("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_result_times_out() {
        let pipeline = point_pipeline(500);
        let ttl = pipeline.config.cache.ttl;

        let id = CorrelationId::new();
        pipeline.store.record(id, json!("stale"));
        let past_ttl = Utc::now() + TimeDelta::seconds(ttl.as_secs() as i64 + 1);
        assert_eq!(pipeline.store.evict_expired(past_ttl, ttl), 1);

        let err = pipeline
            .bridge
            .await_result(id, Duration::from_secs(2), Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    // =========================================================================
    // RESULT TOPIC HYGIENE
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_malformed_results_are_skipped() {
        let pipeline = point_pipeline(100);
        let topic = pipeline.config.result_topic.clone();

        let id = pipeline.bridge.submit(json!({"prompt": "x"})).await.unwrap();
        pipeline.broker.publish(&topic, None, b"not json".to_vec()).await.unwrap();
        pipeline
            .broker
            .publish(&topic, None, br#"{"topic":"t","message":{}}"#.to_vec())
            .await
            .unwrap();
        pipeline.publish_result(id, json!("ok")).await;

        let value = pipeline
            .bridge
            .await_result(id, Duration::from_secs(2), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(value, json!("ok"));
        assert_eq!(pipeline.ingest_stats.malformed.load(Ordering::Relaxed), 2);
        assert_eq!(pipeline.ingest_stats.ingested.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_results_last_write_wins() {
        let pipeline = point_pipeline(100);

        let id = CorrelationId::new();
        pipeline.publish_result(id, json!("first")).await;
        pipeline.publish_result(id, json!("second")).await;

        // Let the ingestor drain both before the first poll.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let value = pipeline
            .bridge
            .await_result(id, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(value, json!("second"));
        assert_eq!(pipeline.store.stats().overwrites.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_results_do_not_resolve_a_wait() {
        let pipeline = point_pipeline(100);

        let id = pipeline.bridge.submit(json!({"prompt": "mine"})).await.unwrap();
        for _ in 0..5 {
            pipeline.publish_result(CorrelationId::new(), json!("theirs")).await;
        }

        let err = pipeline
            .bridge
            .await_result(id, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(pipeline.store.len(), 5);
    }
}
