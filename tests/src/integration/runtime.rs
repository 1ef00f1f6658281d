//! # Runtime Flows
//!
//! Drives a fully wired [`bridge_runtime::DreamRuntime`], with and without
//! the built-in echo worker.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::spawn_worker;
    use bridge_runtime::{DreamRuntime, RuntimeConfig};
    use correlation_bridge::ReadMode;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn runtime_config(echo_worker: bool, read_mode: ReadMode) -> RuntimeConfig {
        let mut config = RuntimeConfig {
            echo_worker,
            echo_delay: Duration::from_secs(1),
            ..Default::default()
        };
        config.bridge.read_mode = read_mode;
        config.bridge.poll_interval = Duration::from_millis(100);
        config.bridge.timeout = Duration::from_secs(5);
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_worker_answers_requests() {
        let runtime = DreamRuntime::new(runtime_config(true, ReadMode::PointLookup));
        runtime.start().await.unwrap();

        let start = Instant::now();
        let value = runtime.bridge().request(json!({"prompt": "hello"})).await.unwrap();

        assert_eq!(value, json!("hello"));
        assert!(start.elapsed() >= Duration::from_secs(1));
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_worker_in_snapshot_mode() {
        let runtime = DreamRuntime::new(runtime_config(false, ReadMode::Snapshot));
        runtime.start().await.unwrap();
        let _worker = spawn_worker(
            runtime.broker(),
            &runtime.config().bridge,
            || Duration::from_millis(500),
            |_| json!("world"),
        );

        let bridge = runtime.bridge();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let bridge = bridge.clone();
            handles.push(tokio::spawn(async move {
                bridge.request(json!({"prompt": "hello"})).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("world"));
        }

        let ingest = runtime.ingest_stats();
        assert_eq!(ingest.ingested.load(Ordering::Relaxed), 10);
        assert_eq!(ingest.snapshots_published.load(Ordering::Relaxed), 10);
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_worker_uses_configured_timeout() {
        let runtime = DreamRuntime::new(runtime_config(false, ReadMode::PointLookup));
        runtime.start().await.unwrap();

        let start = Instant::now();
        let err = runtime.bridge().request(json!({"prompt": "void"})).await.unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_background_tasks() {
        let runtime = DreamRuntime::new(runtime_config(true, ReadMode::PointLookup));
        runtime.start().await.unwrap();
        runtime.shutdown().await;

        assert!(runtime.broker().is_closed());
        let err = runtime.bridge().submit(json!({"prompt": "late"})).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
