//! Bridge error types.
//!
//! | Error | Raised by | Meaning | HTTP class |
//! |-------|-----------|---------|------------|
//! | `Publish` | `submit` | the bus refused the request; never retried here | 500 |
//! | `DeadlineExceeded` | `await_result` | no result before the deadline; a normal outcome | 408 |
//! | `StoreCorruption` | `await_result` | the state source broke the unique-key invariant | 500 |
//! | `Encode` | `submit` | the payload could not be serialized | 500 |
//!
//! Read failures during polling ([`ReadError`]) are transient unless they
//! report corruption, and never reach the caller on their own.

use response_cache::SnapshotError;
use shared_bus::{BusError, PublishError};
use shared_types::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// HTTP status codes for the two error classes.
pub mod status {
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// Errors returned to callers of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to publish request: {0}")]
    Publish(#[from] PublishError),

    #[error("no result for {correlation_id} within {timeout:?} ({polls} polls)")]
    DeadlineExceeded {
        correlation_id: CorrelationId,
        timeout: Duration,
        polls: u32,
    },

    #[error("response store corrupted while waiting for {correlation_id}: {reason}")]
    StoreCorruption {
        correlation_id: CorrelationId,
        reason: String,
    },

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

impl BridgeError {
    /// HTTP status class for a front door mapping this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DeadlineExceeded { .. } => status::REQUEST_TIMEOUT,
            Self::Publish(_) | Self::StoreCorruption { .. } | Self::Encode(_) => {
                status::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// Only a deadline is worth retrying; the bridge itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

/// A failed read of the current state during polling.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The state could not be decoded. Polling continues.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The source was unreachable. Polling continues.
    #[error("state source unavailable: {0}")]
    Unavailable(#[from] BusError),

    /// The state contradicts itself. Polling stops.
    #[error("{0}")]
    Corruption(String),
}

impl ReadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}

impl From<SnapshotError> for ReadError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Decode(e) => Self::Decode(e.to_string()),
            corruption @ SnapshotError::Corruption { .. } => {
                Self::Corruption(corruption.to_string())
            }
        }
    }
}
