//! # Dream Bridge Runtime
//!
//! Composition root for the `dream-node` binary, exposed as a library so
//! the integration suite can drive a fully wired node.
//!
//! ## Wiring
//!
//! ```text
//!                 ┌──────────────────── InMemoryBroker ─────────────────────┐
//!                 │ user_prompt          llm_response         response_cache│
//!                 └────┬─────────▲──────────┬──────────▲──────────────┬─────┘
//!      submit()        │         │          │          │ (snapshot    │
//!  CorrelationBridge ──┘    EchoWorker ─────┘          │  mode only)  │
//!         ▲                                  ResultIngestor ──────────┘
//!         │ poll                                  │ record
//!         └──────────── StateReader ◄──── ResponseStore
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Build broker, store, reader and bridge
//! 2. Subscribe the ingestor (and echo worker) before anything is published
//! 3. Spawn the tasks and the metrics sync loop
//! 4. Serve requests through [`DreamRuntime::bridge`]

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::RuntimeConfig;

use crate::handlers::EchoWorker;
use crate::metrics::{sync_metrics, MetricsSources};
use anyhow::Result;
use correlation_bridge::{reader_for, CorrelationBridge, ReadMode};
use parking_lot::Mutex;
use response_cache::{IngestStats, ResponseStore, ResultIngestor};
use shared_bus::InMemoryBroker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long `shutdown` waits for tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A fully wired node.
pub struct DreamRuntime {
    config: RuntimeConfig,
    broker: Arc<InMemoryBroker>,
    store: Arc<ResponseStore>,
    bridge: Arc<CorrelationBridge>,
    /// Taken by `start`.
    ingestor: Mutex<Option<ResultIngestor>>,
    ingest_stats: Arc<IngestStats>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DreamRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        info!(read_mode = %config.bridge.read_mode, "Creating dream bridge runtime");

        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(ResponseStore::new(&config.bridge.cache));

        let reader = reader_for(&config.bridge, store.clone(), broker.clone());
        let bridge = Arc::new(CorrelationBridge::new(&config.bridge, broker.clone(), reader));

        let mut ingestor = ResultIngestor::new(store.clone());
        if config.bridge.read_mode == ReadMode::Snapshot {
            ingestor = ingestor
                .with_snapshot_publisher(broker.clone(), config.bridge.snapshot_topic.clone());
        }
        let ingest_stats = ingestor.stats();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            broker,
            store,
            bridge,
            ingestor: Mutex::new(Some(ingestor)),
            ingest_stats,
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the background tasks. Calling it twice is an error.
    pub async fn start(&self) -> Result<()> {
        let ingestor = self
            .ingestor
            .lock()
            .take()
            .ok_or_else(|| anyhow::anyhow!("runtime already started"))?;

        info!("===========================================");
        info!("  Dream Bridge Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let bridge_config = &self.config.bridge;
        let mut tasks = Vec::new();

        let results = self.broker.subscribe(&bridge_config.result_topic);
        tasks.push(tokio::spawn(ingestor.run(results, self.shutdown_rx.clone())));

        if self.config.echo_worker {
            let requests = self.broker.subscribe(&bridge_config.request_topic);
            let worker = EchoWorker::new(
                self.broker.clone(),
                bridge_config.result_topic.clone(),
                self.config.echo_delay,
            );
            tasks.push(tokio::spawn(worker.run(requests, self.shutdown_rx.clone())));
        } else {
            warn!("Echo worker disabled; requests wait for an external worker");
        }

        tasks.push(self.spawn_metrics_sync());
        self.tasks.lock().extend(tasks);

        info!(request_topic = %bridge_config.request_topic, "Request topic");
        info!(result_topic = %bridge_config.result_topic, "Result topic");
        info!(
            timeout_ms = bridge_config.timeout.as_millis() as u64,
            poll_interval_ms = bridge_config.poll_interval.as_millis() as u64,
            "Bridge ready"
        );
        Ok(())
    }

    fn spawn_metrics_sync(&self) -> JoinHandle<()> {
        let bridge_stats = self.bridge.stats();
        let store = self.store.clone();
        let ingest = self.ingest_stats.clone();
        let broker = self.broker.clone();
        let topics = self.topics();
        let interval = self.config.metrics_sync_interval;
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                sync_metrics(&MetricsSources {
                    bridge: &bridge_stats,
                    store: &store,
                    ingest: &ingest,
                    broker: &broker,
                    topics: &topics,
                });
            }
        })
    }

    /// Shutdown the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal shutdown to all tasks
    /// 2. Close the broker so subscriptions drain and end
    /// 3. Wait (bounded) for the tasks
    /// 4. Final metrics sync
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        self.broker.close();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Task did not stop within {:?}", SHUTDOWN_GRACE);
            }
        }

        self.sync_metrics();
        info!("Shutdown complete");
    }

    /// Copy current statistics into Prometheus now.
    pub fn sync_metrics(&self) {
        let bridge_stats = self.bridge.stats();
        let topics = self.topics();
        sync_metrics(&MetricsSources {
            bridge: &bridge_stats,
            store: &self.store,
            ingest: &self.ingest_stats,
            broker: &self.broker,
            topics: &topics,
        });
    }

    fn topics(&self) -> Vec<String> {
        let c = &self.config.bridge;
        vec![
            c.request_topic.clone(),
            c.result_topic.clone(),
            c.snapshot_topic.clone(),
        ]
    }

    pub fn bridge(&self) -> Arc<CorrelationBridge> {
        self.bridge.clone()
    }

    pub fn store(&self) -> Arc<ResponseStore> {
        self.store.clone()
    }

    pub fn broker(&self) -> Arc<InMemoryBroker> {
        self.broker.clone()
    }

    pub fn ingest_stats(&self) -> Arc<IngestStats> {
        self.ingest_stats.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
