//! # `BusEnvelope`
//!
//! Wrapper for every message written to the bus.
//!
//! ```json
//! {"timestamp": "2024-01-01T00:00:00Z", "topic": "...", "message": { ... }}
//! ```
//!
//! The timestamp is the publisher's clock and is informational only.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The message envelope for all bus traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEnvelope<T> {
    /// When the publisher produced the message.
    pub timestamp: DateTime<Utc>,
    /// Topic the message was published to.
    pub topic: String,
    /// The actual message payload.
    pub message: T,
}

impl<T> BusEnvelope<T> {
    /// Wrap a message for `topic`, stamped now.
    pub fn new(topic: impl Into<String>, message: T) -> Self {
        Self {
            timestamp: Utc::now(),
            topic: topic.into(),
            message,
        }
    }

    /// Unwrap the payload.
    pub fn into_message(self) -> T {
        self.message
    }
}

impl<T: Serialize> BusEnvelope<T> {
    /// Encode as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: DeserializeOwned> BusEnvelope<T> {
    /// Decode from JSON bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
