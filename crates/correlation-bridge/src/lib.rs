//! # Correlation Bridge
//!
//! Turns "publish a request, some worker eventually publishes a result
//! under the same id" into one awaitable call.
//!
//! ```text
//!  caller ──submit_and_await──► CorrelationBridge ──publish(user_prompt)──► bus ──► worker
//!                                      │                                            │
//!                                      │ poll every poll_interval                   │
//!                                      ▼                                            ▼
//!                                 StateReader ◄──── ResponseStore ◄── ResultIngestor ◄── llm_response
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = Arc::new(ResponseStore::new(&config.cache));
//! let reader = reader_for(&config, store.clone(), broker.clone());
//! let bridge = CorrelationBridge::new(&config, broker.clone(), reader);
//!
//! let answer = bridge.submit_and_await(json!({"prompt": "hello"}), Duration::from_secs(5)).await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bridge;
pub mod config;
pub mod error;
pub mod reader;

pub use bridge::{BridgeStats, CorrelationBridge, MAX_TIMEOUT, MIN_POLL_INTERVAL};
pub use config::{BridgeConfig, ConfigError, ReadMode};
pub use error::{BridgeError, ReadError};
pub use reader::{reader_for, SnapshotReader, StateReader, StoreReader};
