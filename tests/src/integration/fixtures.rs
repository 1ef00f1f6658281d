//! Shared fixtures: a wired pipeline and a scriptable worker.

use correlation_bridge::{reader_for, BridgeConfig, CorrelationBridge, ReadMode};
use response_cache::{IngestStats, ResponseStore, ResultIngestor};
use shared_bus::{InMemoryBroker, Publisher};
use shared_types::{BusEnvelope, CorrelationId, PendingRequest, ResultEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Broker, store, ingestor task and bridge, wired the way the runtime does.
pub struct Pipeline {
    pub config: BridgeConfig,
    pub broker: Arc<InMemoryBroker>,
    pub store: Arc<ResponseStore>,
    pub bridge: Arc<CorrelationBridge>,
    pub ingest_stats: Arc<IngestStats>,
    shutdown_tx: watch::Sender<bool>,
}

impl Pipeline {
    pub fn start(config: BridgeConfig) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(ResponseStore::new(&config.cache));

        let mut ingestor = ResultIngestor::new(store.clone());
        if config.read_mode == ReadMode::Snapshot {
            ingestor =
                ingestor.with_snapshot_publisher(broker.clone(), config.snapshot_topic.clone());
        }
        let ingest_stats = ingestor.stats();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(ingestor.run(broker.subscribe(&config.result_topic), shutdown_rx));

        let reader = reader_for(&config, store.clone(), broker.clone());
        let bridge = Arc::new(CorrelationBridge::new(&config, broker.clone(), reader));

        Self {
            config,
            broker,
            store,
            bridge,
            ingest_stats,
            shutdown_tx,
        }
    }

    /// Publish a result onto the result topic, as a worker would.
    pub async fn publish_result(&self, correlation_id: CorrelationId, value: serde_json::Value) {
        let bytes = BusEnvelope::new(
            self.config.result_topic.as_str(),
            ResultEnvelope::new(correlation_id, value),
        )
        .encode()
        .unwrap();
        self.broker
            .publish(&self.config.result_topic, Some(&correlation_id.to_string()), bytes)
            .await
            .unwrap();
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Config with a short poll interval for the given read mode.
pub fn test_config(read_mode: ReadMode, poll_interval: Duration) -> BridgeConfig {
    BridgeConfig {
        read_mode,
        poll_interval,
        ..Default::default()
    }
}

/// Spawn a worker that answers every request on the bus.
///
/// Each answer is published after `delay()` with value `answer(payload)`,
/// independently of the others.
pub fn spawn_worker<D, A>(
    broker: Arc<InMemoryBroker>,
    config: &BridgeConfig,
    delay: D,
    answer: A,
) -> JoinHandle<()>
where
    D: Fn() -> Duration + Send + 'static,
    A: Fn(&serde_json::Value) -> serde_json::Value + Send + 'static,
{
    let mut requests = broker.subscribe(&config.request_topic);
    let result_topic = config.result_topic.clone();

    tokio::spawn(async move {
        while let Some(message) = requests.recv().await {
            let request = BusEnvelope::<PendingRequest>::decode(&message.payload)
                .unwrap()
                .into_message();
            let wait = delay();
            let value = answer(&request.payload);
            let broker = broker.clone();
            let topic = result_topic.clone();

            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                let id = request.correlation_id;
                let bytes = BusEnvelope::new(topic.as_str(), ResultEnvelope::new(id, value))
                    .encode()
                    .unwrap();
                // The broker may already be closed when a test ends early.
                let _ = broker.publish(&topic, Some(&id.to_string()), bytes).await;
            });
        }
    })
}
