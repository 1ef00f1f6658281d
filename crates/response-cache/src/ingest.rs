//! Result ingestion.
//!
//! Consumes worker results from the bus, merges them into the
//! [`ResponseStore`], and optionally republishes the whole mapping so that
//! snapshot readers can observe it.

use crate::store::ResponseStore;
use shared_bus::{BusMessage, PublishError, Publisher, Subscription};
use shared_types::{BusEnvelope, CorrelationId, ResultEnvelope};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Errors handling a single result message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The message is not a `BusEnvelope<ResultEnvelope>`.
    #[error("malformed result on {topic} at offset {offset}: {source}")]
    Malformed {
        topic: String,
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    /// The result was recorded but the snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    SnapshotEncode(serde_json::Error),

    /// The result was recorded but the snapshot could not be published.
    #[error("snapshot publish failed: {0}")]
    SnapshotPublish(#[from] PublishError),
}

/// Statistics for the ingestor
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Results merged into the store
    pub ingested: AtomicU64,
    /// Messages that failed to decode
    pub malformed: AtomicU64,
    /// Snapshots published
    pub snapshots_published: AtomicU64,
    /// Snapshot encode/publish failures
    pub snapshot_failures: AtomicU64,
}

/// Where to republish snapshots.
struct SnapshotSink {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

/// Task merging worker results into the response store.
pub struct ResultIngestor {
    store: Arc<ResponseStore>,
    snapshot_sink: Option<SnapshotSink>,
    stats: Arc<IngestStats>,
}

impl ResultIngestor {
    pub fn new(store: Arc<ResponseStore>) -> Self {
        Self {
            store,
            snapshot_sink: None,
            stats: Arc::new(IngestStats::default()),
        }
    }

    /// Republish the whole mapping to `topic` after every merged result.
    pub fn with_snapshot_publisher(
        mut self,
        publisher: Arc<dyn Publisher>,
        topic: impl Into<String>,
    ) -> Self {
        self.snapshot_sink = Some(SnapshotSink {
            publisher,
            topic: topic.into(),
        });
        self
    }

    /// Shared handle to the statistics; stays valid after `run` consumes
    /// the ingestor.
    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Decode one result message and record it.
    ///
    /// The result is in the store before any snapshot error is returned.
    pub async fn handle(&self, message: &BusMessage) -> Result<CorrelationId, IngestError> {
        let envelope: BusEnvelope<ResultEnvelope> = BusEnvelope::decode(&message.payload)
            .map_err(|source| {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                IngestError::Malformed {
                    topic: message.topic.clone(),
                    offset: message.offset,
                    source,
                }
            })?;

        let result = envelope.into_message();
        let correlation_id = result.correlation_id;
        self.store.record(correlation_id, result.value);
        self.stats.ingested.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            offset = message.offset,
            "Ingested result"
        );

        if let Some(sink) = &self.snapshot_sink {
            self.publish_snapshot(sink).await.inspect_err(|_| {
                self.stats.snapshot_failures.fetch_add(1, Ordering::Relaxed);
            })?;
        }

        Ok(correlation_id)
    }

    async fn publish_snapshot(&self, sink: &SnapshotSink) -> Result<(), IngestError> {
        let snapshot = self.store.snapshot();
        let bytes = snapshot
            .to_message(&sink.topic)
            .map_err(IngestError::SnapshotEncode)?;
        sink.publisher.publish(&sink.topic, None, bytes).await?;
        self.stats.snapshots_published.fetch_add(1, Ordering::Relaxed);
        debug!(topic = %sink.topic, entries = snapshot.len(), "Published response snapshot");
        Ok(())
    }

    /// Consume `subscription` until it closes or `shutdown` flips to true.
    ///
    /// Per-message failures are logged and skipped.
    pub async fn run(self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(topic = subscription.topic(), "[ResultIngestor] Started");

        loop {
            tokio::select! {
                message = subscription.recv() => {
                    let Some(message) = message else {
                        warn!("[ResultIngestor] Subscription ended, shutting down");
                        break;
                    };
                    if let Err(e) = self.handle(&message).await {
                        warn!(error = %e, "Failed to ingest result");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[ResultIngestor] Shutdown requested");
                        break;
                    }
                }
            }
        }
    }
}
