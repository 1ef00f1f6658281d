//! A message as stored in a topic log.

use chrono::{DateTime, Utc};

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic it was published to.
    pub topic: String,
    /// Position in the topic log, starting at 0.
    pub offset: u64,
    /// Partition/routing key, if the publisher supplied one.
    pub key: Option<String>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// When the broker appended it.
    pub published_at: DateTime<Utc>,
}
