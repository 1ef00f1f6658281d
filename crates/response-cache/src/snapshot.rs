//! # Response Snapshot
//!
//! The whole response mapping as one bus message, for readers that can only
//! see the latest message of a topic.
//!
//! ```json
//! {"timestamp": "...", "topic": "template-generator.response_cache",
//!  "message": {"<correlation_id>": {"correlation_id": "...", "value": ..., "recorded_at": "..."}}}
//! ```
//!
//! Decoding checks that every key matches the id embedded in its entry. A
//! mismatch means whoever built the snapshot broke the unique-key
//! invariant and is reported as corruption, not as a decode failure.

use serde::{Deserialize, Serialize};
use shared_types::{BusEnvelope, CorrelationId, ResultEntry};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors decoding a snapshot message.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The bytes are not a well-formed snapshot envelope.
    #[error("malformed snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    /// An entry is filed under a key other than its own correlation id.
    #[error("snapshot entry under key {key} carries correlation id {embedded}")]
    Corruption { key: String, embedded: CorrelationId },
}

impl SnapshotError {
    /// Corruption is fatal; decode failures are transient.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}

/// Whole-mapping snapshot of the response store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseSnapshot {
    entries: BTreeMap<String, ResultEntry>,
}

impl ResponseSnapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = ResultEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.correlation_id.to_string(), entry))
                .collect(),
        }
    }

    /// Entry for `id`, if present.
    pub fn get(&self, id: &CorrelationId) -> Option<&ResultEntry> {
        self.entries.get(&id.to_string())
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a bus message for `topic`.
    pub fn to_message(&self, topic: &str) -> Result<Vec<u8>, serde_json::Error> {
        BusEnvelope::new(topic, self).encode()
    }

    /// Decode a bus message and verify key/id consistency.
    pub fn from_message(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let envelope: BusEnvelope<ResponseSnapshot> = BusEnvelope::decode(bytes)?;
        let snapshot = envelope.into_message();
        snapshot.verify()?;
        Ok(snapshot)
    }

    fn verify(&self) -> Result<(), SnapshotError> {
        for (key, entry) in &self.entries {
            let matches = CorrelationId::parse(key)
                .map(|parsed| parsed == entry.correlation_id)
                .unwrap_or(false);
            if !matches {
                return Err(SnapshotError::Corruption {
                    key: key.clone(),
                    embedded: entry.correlation_id,
                });
            }
        }
        Ok(())
    }
}
