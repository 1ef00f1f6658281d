//! # Subscriber
//!
//! The reading side of the bus: live subscriptions and "latest message"
//! reads.

use crate::message::BusMessage;
use crate::publisher::InMemoryBroker;
use async_trait::async_trait;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from reading the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The broker was closed.
    #[error("broker closed")]
    Closed,

    /// Transport-level failure reported by an external broker client.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Trait for reading the current head of a topic.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Advance to the most recent offset of `topic` and return the payload
    /// found there, discarding any backlog.
    ///
    /// `Ok(None)` means nothing has been published to the topic yet.
    async fn read_latest(&self, topic: &str) -> Result<Option<Vec<u8>>, BusError>;
}

#[async_trait]
impl SnapshotSource for InMemoryBroker {
    async fn read_latest(&self, topic: &str) -> Result<Option<Vec<u8>>, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let topics = self.topics.read();
        let latest = topics
            .get(topic)
            .and_then(|log| log.messages.back())
            .map(|message| message.payload.clone());
        Ok(latest)
    }
}

/// A live subscription to one topic.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(topic: String, receiver: broadcast::Receiver<BusMessage>) -> Self {
        Self { topic, receiver }
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next message on the topic
    /// - `None` - The broker was closed and the backlog is drained
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        topic = %self.topic,
                        lagged = count,
                        "Subscriber lagged, messages dropped"
                    );
                    continue;
                }
            }
        }
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available
    /// - `Ok(None)` - Nothing available right now
    /// - `Err(BusError::Closed)` - The broker was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, BusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(
                        topic = %self.topic,
                        lagged = count,
                        "Subscriber lagged, messages dropped"
                    );
                    continue;
                }
            }
        }
    }

    /// Topic this subscription reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Convert into a [`Stream`] for use with stream combinators.
    #[must_use]
    pub fn into_stream(self) -> MessageStream {
        MessageStream {
            topic: self.topic,
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// Stream adapter over a [`Subscription`]. Lag is logged and skipped.
pub struct MessageStream {
    topic: String,
    inner: BroadcastStream<BusMessage>,
}

impl MessageStream {
    /// Topic this stream reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for MessageStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(message))) => return Poll::Ready(Some(message)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(topic = %self.topic, lagged = count, "Stream lagged, messages dropped");
                    continue;
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
