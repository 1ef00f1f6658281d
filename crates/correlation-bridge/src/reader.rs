//! # State Readers
//!
//! The bridge never holds results itself; each poll asks a [`StateReader`]
//! for the freshest view of "results recorded so far".
//!
//! - [`StoreReader`]: point lookup in the shared [`ResponseStore`]
//! - [`SnapshotReader`]: decode the newest whole-mapping snapshot from the
//!   bus and check membership. O(n) per poll. An id evicted before the
//!   snapshot that would have carried it is simply never seen.

use crate::config::{BridgeConfig, ReadMode};
use crate::error::ReadError;
use async_trait::async_trait;
use response_cache::{ResponseSnapshot, ResponseStore};
use shared_bus::SnapshotSource;
use shared_types::CorrelationId;
use std::sync::Arc;
use tracing::trace;

/// Source of the current result state.
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Value recorded for `id`, if any, as of now.
    async fn lookup(&self, id: &CorrelationId) -> Result<Option<serde_json::Value>, ReadError>;

    /// Resolves when the state may have changed.
    ///
    /// A hint only: waiters re-poll early when it fires and otherwise fall
    /// back to their poll interval. The default never resolves.
    async fn changed(&self) {
        std::future::pending::<()>().await
    }
}

/// Point lookup against the shared response store.
#[derive(Clone)]
pub struct StoreReader {
    store: Arc<ResponseStore>,
}

impl StoreReader {
    pub fn new(store: Arc<ResponseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StateReader for StoreReader {
    async fn lookup(&self, id: &CorrelationId) -> Result<Option<serde_json::Value>, ReadError> {
        Ok(self.store.lookup(id).map(|entry| entry.value))
    }

    async fn changed(&self) {
        self.store.changed().await
    }
}

/// Reads the newest snapshot message on a topic.
pub struct SnapshotReader {
    source: Arc<dyn SnapshotSource>,
    topic: String,
}

impl SnapshotReader {
    pub fn new(source: Arc<dyn SnapshotSource>, topic: impl Into<String>) -> Self {
        Self {
            source,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl StateReader for SnapshotReader {
    async fn lookup(&self, id: &CorrelationId) -> Result<Option<serde_json::Value>, ReadError> {
        let Some(bytes) = self.source.read_latest(&self.topic).await? else {
            trace!(topic = %self.topic, "No snapshot published yet");
            return Ok(None);
        };

        let snapshot = ResponseSnapshot::from_message(&bytes)?;
        trace!(topic = %self.topic, entries = snapshot.len(), "Read snapshot");
        Ok(snapshot.get(id).map(|entry| entry.value.clone()))
    }
}

/// Reader for the configured [`ReadMode`].
pub fn reader_for(
    config: &BridgeConfig,
    store: Arc<ResponseStore>,
    source: Arc<dyn SnapshotSource>,
) -> Arc<dyn StateReader> {
    match config.read_mode {
        ReadMode::PointLookup => Arc::new(StoreReader::new(store)),
        ReadMode::Snapshot => Arc::new(SnapshotReader::new(source, config.snapshot_topic.clone())),
    }
}
