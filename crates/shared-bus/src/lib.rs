//! # Shared Bus - Topic-Based Publish/Subscribe
//!
//! The transport seam between the correlation bridge and the workers.
//!
//! ```text
//! ┌──────────────┐  publish(user_prompt)   ┌──────────────┐
//! │    Bridge    │ ──────────┐             │    Worker    │
//! │              │           ▼             │              │
//! └──────────────┘     ┌──────────────┐    └──────────────┘
//!        ↑             │    Broker    │ ←──────┘ publish(llm_response)
//!        │             │  (topic log) │
//!        └─────────────└──────────────┘
//!     read_latest(response_cache) / subscribe(llm_response)
//! ```
//!
//! The real deployment talks to an external broker; [`InMemoryBroker`]
//! implements the same traits for single-process runs and tests.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod publisher;
pub mod subscriber;
pub mod topics;

// Re-export main types
pub use message::BusMessage;
pub use publisher::{InMemoryBroker, PublishError, Publisher};
pub use subscriber::{BusError, MessageStream, SnapshotSource, Subscription};

/// Messages buffered per live subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Messages retained per topic for `read_latest` and offset queries.
pub const DEFAULT_RETENTION: usize = 1000;

/// Largest payload the in-memory broker accepts (1 MiB, Kafka's default).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;
