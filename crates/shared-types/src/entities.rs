//! # Request and Result Records
//!
//! The three shapes a correlation goes through:
//!
//! ```text
//! PendingRequest ──publish──→ worker ──publish──→ ResultEnvelope
//!                                                      │
//!                                             merge into store
//!                                                      ↓
//!                                                 ResultEntry
//! ```

use crate::correlation::CorrelationId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A request as handed to the publisher.
///
/// The bridge builds one per `submit` and drops it right after publishing;
/// only the eventual result is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Fresh correlation id for this request.
    #[serde(alias = "request_id")]
    pub correlation_id: CorrelationId,
    /// Caller payload, passed through untouched (e.g. `{"prompt": "..."}`).
    pub payload: serde_json::Value,
    /// When the bridge accepted the request.
    pub submitted_at: DateTime<Utc>,
}

impl PendingRequest {
    /// Create a request stamped with the current time.
    pub fn new(correlation_id: CorrelationId, payload: serde_json::Value) -> Self {
        Self {
            correlation_id,
            payload,
            submitted_at: Utc::now(),
        }
    }
}

/// What a worker publishes once it has a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Correlation id copied from the originating request.
    #[serde(alias = "request_id")]
    pub correlation_id: CorrelationId,
    /// Opaque result value; must round-trip its full structure.
    pub value: serde_json::Value,
}

impl ResultEnvelope {
    pub fn new(correlation_id: CorrelationId, value: serde_json::Value) -> Self {
        Self {
            correlation_id,
            value,
        }
    }
}

/// A result as held by the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub correlation_id: CorrelationId,
    pub value: serde_json::Value,
    /// Wall-clock time the entry was merged into the cache. Workers may be
    /// skewed or replayed, so their clocks are never used here.
    pub recorded_at: DateTime<Utc>,
}

impl ResultEntry {
    pub fn new(
        correlation_id: CorrelationId,
        value: serde_json::Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_id,
            value,
            recorded_at,
        }
    }

    /// Age of the entry at `now`. Clamped to zero if `now` precedes the
    /// record time.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.recorded_at)
            .max(TimeDelta::zero())
    }
}

impl From<ResultEntry> for ResultEnvelope {
    fn from(entry: ResultEntry) -> Self {
        Self {
            correlation_id: entry.correlation_id,
            value: entry.value,
        }
    }
}
