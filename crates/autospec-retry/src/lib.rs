//! Persistent per-spec, per-stage retry-attempt tracking.
//!
//! Distinct from an in-process exponential-backoff executor: this store
//! tracks *how many times a stage has been retried for a given spec*,
//! surviving process restarts, so a resumed run knows it already
//! exhausted (or is approaching) its retry budget.

pub mod error;
pub mod record;
pub mod store;

pub use error::{Result, RetryError};
pub use record::{FailureKind, RetryRecord, SpecRetryState};
pub use store::RetryStore;
