//! # Shared Types Crate
//!
//! Types that cross the bus between the bridge, the ingestion path and
//! the workers.
//!
//! ## Design Principles
//!
//! - **Opaque correlation**: a [`CorrelationId`] is only ever a lookup key.
//! - **Envelope on the wire**: everything published is wrapped in a
//!   [`BusEnvelope`] carrying the topic and the publisher's timestamp.
//! - **Consumer clock authority**: [`ResultEntry::recorded_at`] is stamped
//!   by whoever merges the result, never by the worker.

pub mod correlation;
pub mod entities;
pub mod envelope;

pub use correlation::CorrelationId;
pub use entities::{PendingRequest, ResultEntry, ResultEnvelope};
pub use envelope::BusEnvelope;
