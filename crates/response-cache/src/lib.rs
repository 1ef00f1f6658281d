//! # Response Cache
//!
//! Bounded-lifetime store of worker results, keyed by correlation id.
//!
//! ```text
//!   llm_response topic ──► ResultIngestor ──record──► ResponseStore ◄──lookup── bridge
//!                                 │                        │
//!                                 └── snapshot() ──► response_cache topic
//! ```
//!
//! - [`ResponseCache`]: single-owner map with lazy TTL eviction
//! - [`ResponseStore`]: the shared, locked, change-notifying wrapper
//! - [`ResponseSnapshot`]: the whole mapping as one bus message
//! - [`ResultIngestor`]: the task feeding the store from the bus

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cache;
pub mod config;
pub mod ingest;
pub mod snapshot;
pub mod store;

pub use cache::{RecordOutcome, ResponseCache};
pub use config::{CacheConfigError, ResponseCacheConfig};
pub use ingest::{IngestError, IngestStats, ResultIngestor};
pub use snapshot::{ResponseSnapshot, SnapshotError};
pub use store::{ResponseStore, StoreStats};
