//! # Dream Node
//!
//! Reads prompts from stdin, one per line, sends each through the
//! correlation bridge, and prints the answer (or the timeout) to stdout.
//!
//! ```text
//! $ echo "hello" | dream-node
//! 3f0c...: "hello"
//! ```
//!
//! Requests run concurrently. EOF waits for in-flight requests; Ctrl+C
//! abandons them.

use anyhow::{Context, Result};
use bridge_runtime::{DreamRuntime, RuntimeConfig};
use bridge_telemetry::{
    encode_metrics, init_telemetry, time_histogram, TelemetryConfig, WAIT_DURATION,
};
use correlation_bridge::CorrelationBridge;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry = init_telemetry(&telemetry_config).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env()?;
    let runtime = DreamRuntime::new(config);
    runtime.start().await.context("Failed to start runtime")?;

    info!("Reading prompts from stdin. Press Ctrl+C or send EOF to stop.");

    let bridge = runtime.bridge();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!(in_flight = in_flight.len(), "EOF on stdin, draining requests");
                    while in_flight.join_next().await.is_some() {}
                    break;
                };
                let prompt = line.trim();
                if prompt.is_empty() {
                    continue;
                }
                in_flight.spawn(answer(bridge.clone(), prompt.to_string()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!(in_flight = in_flight.len(), "Ctrl+C received, abandoning requests");
                in_flight.abort_all();
                break;
            }
            // Reap finished requests so the set does not grow unbounded.
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    runtime.shutdown().await;

    match encode_metrics() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to encode metrics"),
    }
    Ok(())
}

async fn answer(bridge: Arc<CorrelationBridge>, prompt: String) {
    let _timer = time_histogram!(WAIT_DURATION);
    let timeout = bridge.default_timeout();

    let correlation_id = match bridge.submit(json!({ "prompt": prompt })).await {
        Ok(id) => id,
        Err(e) => {
            println!("error: {e}");
            return;
        }
    };

    match bridge
        .await_result(correlation_id, timeout, bridge.poll_interval())
        .await
    {
        Ok(value) => println!("{correlation_id}: {value}"),
        Err(e) if e.is_deadline_exceeded() => {
            println!("{correlation_id}: timed out after {timeout:?}")
        }
        Err(e) => println!("{correlation_id}: error: {e}"),
    }
}
