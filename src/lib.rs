//! ==============================================================================
//! lib.rs - sensor hub library
//! ==============================================================================
//!
//! purpose:
//!     stores time-series readings per sensor in append-only text logs and
//!     serves them over http. all log access goes through a single storage
//!     worker (coordinator.rs), so concurrent requests never interleave
//!     writes or see a half-written batch.
//!
//! modules:
//!     - domain.rs       Reading / ReadingBatch
//!     - codec.rs        one reading per line of text
//!     - store.rs        per-sensor append-only logs
//!     - coordinator.rs  single-writer worker + handle
//!     - server.rs       axum router
//!     - config.rs       host.toml
//!     - error.rs        error types
//!
//! ==============================================================================

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod server;
pub mod store;

pub use coordinator::{Coordinator, CoordinatorWorker, WorkerStats};
pub use domain::{Reading, ReadingBatch};
pub use error::{MalformedLine, StoreError, SubmitError, ValidationError};
pub use store::LogStore;
