//! # Handlers
//!
//! Bus consumers run by the node besides the result ingestor.

pub mod echo_worker;

pub use echo_worker::EchoWorker;
