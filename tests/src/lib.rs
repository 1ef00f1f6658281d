//! # Dream Bridge Test Suite
//!
//! Unified test crate for scenarios that span several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── cache_benchmarks.rs   # record / lookup / snapshot costs
//! └── src/integration/
//!     ├── flows.rs              # broker + ingestor + bridge, point lookup
//!     ├── snapshot_flow.rs      # the same pipeline read through snapshots
//!     └── runtime.rs            # a fully wired DreamRuntime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::snapshot_flow::
//! cargo bench -p bridge-tests
//! ```
