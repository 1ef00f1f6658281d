//! # Echo Worker
//!
//! Stand-in for the LLM node so the pipeline runs end to end locally.
//!
//! ```text
//! user_prompt ──► EchoWorker ──(sleep delay)──► llm_response
//! ```
//!
//! Answers `{"prompt": "x"}` with `"x"`; any other payload is echoed as is.

use shared_bus::{Publisher, Subscription};
use shared_types::{BusEnvelope, PendingRequest, ResultEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct EchoWorker {
    publisher: Arc<dyn Publisher>,
    result_topic: String,
    delay: Duration,
}

impl EchoWorker {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        result_topic: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            publisher,
            result_topic: result_topic.into(),
            delay,
        }
    }

    /// The value published in answer to `payload`.
    pub fn answer_for(payload: &serde_json::Value) -> serde_json::Value {
        match payload.get("prompt") {
            Some(prompt @ serde_json::Value::String(_)) => prompt.clone(),
            _ => payload.clone(),
        }
    }

    /// Answer every request on `requests` until it closes or `shutdown`
    /// flips to true. Each answer is delayed independently.
    pub async fn run(self, mut requests: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(
            topic = requests.topic(),
            delay_ms = self.delay.as_millis() as u64,
            "[EchoWorker] Started"
        );
        let this = Arc::new(self);

        loop {
            tokio::select! {
                message = requests.recv() => {
                    let Some(message) = message else {
                        warn!("[EchoWorker] Request stream ended, shutting down");
                        break;
                    };
                    let request = match BusEnvelope::<PendingRequest>::decode(&message.payload) {
                        Ok(envelope) => envelope.into_message(),
                        Err(e) => {
                            warn!(
                                offset = message.offset,
                                error = %e,
                                "Skipping malformed request"
                            );
                            continue;
                        }
                    };
                    let worker = this.clone();
                    tokio::spawn(async move { worker.answer(request).await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[EchoWorker] Shutdown requested");
                        break;
                    }
                }
            }
        }
    }

    async fn answer(&self, request: PendingRequest) {
        tokio::time::sleep(self.delay).await;

        let correlation_id = request.correlation_id;
        let result = ResultEnvelope::new(correlation_id, Self::answer_for(&request.payload));
        let bytes = match BusEnvelope::new(self.result_topic.as_str(), result).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "Failed to encode answer");
                return;
            }
        };

        match self
            .publisher
            .publish(&self.result_topic, Some(&correlation_id.to_string()), bytes)
            .await
        {
            Ok(()) => debug!(correlation_id = %correlation_id, "Published answer"),
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "Failed to publish answer")
            }
        }
    }
}
