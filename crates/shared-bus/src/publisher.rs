//! # Publisher
//!
//! The publishing side of the bus and the in-memory broker.

use crate::message::BusMessage;
use crate::subscriber::Subscription;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_RETENTION};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Errors from publishing to the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The broker has been shut down.
    #[error("broker closed")]
    Closed,

    /// The payload exceeds the broker's message size limit.
    #[error("message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// Transport-level failure reported by an external broker client.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Trait for emitting messages onto a topic.
///
/// `key`, when present, is passed through for partition/routing affinity.
/// Nothing above the transport attaches meaning to it.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `message` to `topic`.
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        message: Vec<u8>,
    ) -> Result<(), PublishError>;
}

/// Per-topic state: a bounded log plus a live fan-out channel.
pub(crate) struct TopicLog {
    pub(crate) messages: VecDeque<BusMessage>,
    pub(crate) next_offset: u64,
    /// `None` once the broker is closed, which ends every subscription.
    pub(crate) sender: Option<broadcast::Sender<BusMessage>>,
}

impl TopicLog {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            messages: VecDeque::new(),
            next_offset: 0,
            sender: Some(sender),
        }
    }
}

/// In-memory broker.
///
/// Each topic keeps the last `retention` messages (so readers can jump to
/// the newest one) and a `tokio::sync::broadcast` channel for live
/// subscribers. Suitable for a single process; a deployment against Kafka
/// or similar implements [`Publisher`] and
/// [`SnapshotSource`](crate::SnapshotSource) over its client instead.
pub struct InMemoryBroker {
    pub(crate) topics: RwLock<HashMap<String, TopicLog>>,
    closed: AtomicBool,
    messages_published: AtomicU64,
    capacity: usize,
    retention: usize,
    max_message_bytes: usize,
}

impl InMemoryBroker {
    /// Create a broker with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_CHANNEL_CAPACITY,
            DEFAULT_RETENTION,
            DEFAULT_MAX_MESSAGE_BYTES,
        )
    }

    /// Create a broker with explicit limits.
    ///
    /// `capacity` and `retention` are raised to at least 1.
    #[must_use]
    pub fn with_limits(capacity: usize, retention: usize, max_message_bytes: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            messages_published: AtomicU64::new(0),
            capacity: capacity.max(1),
            retention: retention.max(1),
            max_message_bytes,
        }
    }

    /// Subscribe to messages published to `topic` from now on.
    ///
    /// Backlog is not replayed. A subscription taken after [`close`](Self::close)
    /// ends immediately.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.topics.write();
        let log = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(self.capacity));

        let receiver = match &log.sender {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        };

        debug!(topic = topic, "New subscription created");
        Subscription::new(topic.to_string(), receiver)
    }

    /// Offset the next message on `topic` will get (0 for unknown topics).
    #[must_use]
    pub fn end_offset(&self, topic: &str) -> u64 {
        self.topics
            .read()
            .get(topic)
            .map(|log| log.next_offset)
            .unwrap_or(0)
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .and_then(|log| log.sender.as_ref())
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Total messages accepted across all topics.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Shut the broker down: further publishes fail and every live
    /// subscription drains and then ends.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut topics = self.topics.write();
        for log in topics.values_mut() {
            log.sender = None;
        }
        info!(topics = topics.len(), "Broker closed");
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn append(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<u64, PublishError> {
        let mut topics = self.topics.write();
        // Checked under the lock so a concurrent close() cannot slip between.
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let log = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(self.capacity));

        let offset = log.next_offset;
        let message = BusMessage {
            topic: topic.to_string(),
            offset,
            key: key.map(str::to_string),
            payload,
            published_at: Utc::now(),
        };
        log.next_offset += 1;

        if let Some(sender) = &log.sender {
            // Err only means there are no live subscribers; the log still keeps it.
            let _ = sender.send(message.clone());
        }

        log.messages.push_back(message);
        while log.messages.len() > self.retention {
            log.messages.pop_front();
        }

        Ok(offset)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        message: Vec<u8>,
    ) -> Result<(), PublishError> {
        let size = message.len();
        if size > self.max_message_bytes {
            warn!(topic = topic, size = size, "Message rejected (too large)");
            return Err(PublishError::MessageTooLarge {
                size,
                max: self.max_message_bytes,
            });
        }

        let offset = self.append(topic, key, message)?;
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        debug!(
            topic = topic,
            key = key.unwrap_or("-"),
            offset = offset,
            bytes = size,
            "Message published"
        );
        Ok(())
    }
}
