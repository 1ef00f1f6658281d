//! Correlation Bridge - synchronous-looking waits over the bus.
//!
//! Flow:
//! 1. `submit()` mints a CorrelationId and publishes the request, keyed by it
//! 2. A worker eventually publishes a result carrying the same id
//! 3. The ingestion path records it into the response store
//! 4. `await_result()` polls the [`StateReader`] until the id shows up or
//!    the deadline passes
//!
//! The deadline is measured from the first poll. Each suspension is
//! `min(poll_interval, remaining)`, so the loop never overshoots it and
//! never polls after it.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::reader::StateReader;
use shared_bus::Publisher;
use shared_types::{BusEnvelope, CorrelationId, PendingRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Poll intervals below this are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timeouts above this (about 30 years) are lowered to it, so
/// `Duration::MAX` means "no practical bound" instead of overflowing.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Statistics for the bridge
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Requests published
    pub submitted: AtomicU64,
    /// Waits that returned a value
    pub resolved: AtomicU64,
    /// Waits that hit their deadline
    pub deadline_exceeded: AtomicU64,
    /// Transient read failures while polling
    pub decode_errors: AtomicU64,
    /// Reads attempted
    pub polls: AtomicU64,
}

/// Request/response bridge over a publisher and a state reader.
///
/// Cheap to share behind an `Arc`; every wait is independent and holds no
/// per-waiter state in the bridge.
pub struct CorrelationBridge {
    publisher: Arc<dyn Publisher>,
    reader: Arc<dyn StateReader>,
    request_topic: String,
    default_timeout: Duration,
    poll_interval: Duration,
    stats: Arc<BridgeStats>,
}

impl CorrelationBridge {
    pub fn new(
        config: &BridgeConfig,
        publisher: Arc<dyn Publisher>,
        reader: Arc<dyn StateReader>,
    ) -> Self {
        Self {
            publisher,
            reader,
            request_topic: config.request_topic.clone(),
            default_timeout: config.timeout,
            poll_interval: config.poll_interval,
            stats: Arc::new(BridgeStats::default()),
        }
    }

    /// Publish `payload` under a fresh correlation id and return the id.
    ///
    /// Does not wait for any result. The id is also the partition key.
    pub async fn submit(&self, payload: serde_json::Value) -> Result<CorrelationId, BridgeError> {
        let correlation_id = CorrelationId::new();
        let request = PendingRequest::new(correlation_id, payload);
        let bytes = BusEnvelope::new(self.request_topic.as_str(), &request)
            .encode()
            .map_err(BridgeError::Encode)?;

        self.publisher
            .publish(&self.request_topic, Some(&correlation_id.to_string()), bytes)
            .await
            .inspect_err(|e| {
                warn!(correlation_id = %correlation_id, error = %e, "Failed to publish request");
            })?;

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            topic = %self.request_topic,
            "Submitted request"
        );
        Ok(correlation_id)
    }

    /// Wait until a result for `correlation_id` is visible, or `timeout`
    /// passes.
    ///
    /// Transient read failures are logged and polling continues; corruption
    /// aborts the wait. Dropping the returned future abandons the wait.
    pub async fn await_result(
        &self,
        correlation_id: CorrelationId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let started = Instant::now();
        let deadline = started + timeout.min(MAX_TIMEOUT);
        let mut polls: u32 = 0;

        loop {
            polls = polls.saturating_add(1);
            self.stats.polls.fetch_add(1, Ordering::Relaxed);

            // The read itself is bounded too; a ready read is always taken.
            match tokio::time::timeout_at(deadline, self.reader.lookup(&correlation_id)).await {
                Ok(Ok(Some(value))) => {
                    self.stats.resolved.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        correlation_id = %correlation_id,
                        polls = polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Result resolved"
                    );
                    return Ok(value);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_fatal() => {
                    error!(correlation_id = %correlation_id, error = %e, "Aborting wait");
                    return Err(BridgeError::StoreCorruption {
                        correlation_id,
                        reason: e.to_string(),
                    });
                }
                Ok(Err(e)) => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(correlation_id = %correlation_id, error = %e, "Poll failed, retrying");
                }
                Err(_elapsed) => return Err(self.deadline_exceeded(correlation_id, timeout, polls)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.deadline_exceeded(correlation_id, timeout, polls));
            }

            let nap = poll_interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                _ = self.reader.changed() => {}
            }

            if Instant::now() >= deadline {
                return Err(self.deadline_exceeded(correlation_id, timeout, polls));
            }
        }
    }

    /// `submit` followed by `await_result` with the configured poll interval.
    pub async fn submit_and_await(
        &self,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        let correlation_id = self.submit(payload).await?;
        self.await_result(correlation_id, timeout, self.poll_interval)
            .await
    }

    /// `submit_and_await` with the configured timeout.
    pub async fn request(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        self.submit_and_await(payload, self.default_timeout).await
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Shared handle to the statistics.
    pub fn stats(&self) -> Arc<BridgeStats> {
        self.stats.clone()
    }

    fn deadline_exceeded(
        &self,
        correlation_id: CorrelationId,
        timeout: Duration,
        polls: u32,
    ) -> BridgeError {
        self.stats.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %correlation_id,
            timeout_ms = timeout.as_millis() as u64,
            polls = polls,
            "Deadline exceeded waiting for result"
        );
        BridgeError::DeadlineExceeded {
            correlation_id,
            timeout,
            polls,
        }
    }
}
