//! Error Module - Driver Error Types
//!
//! Errors raised while setting up or tearing down a run. A run that
//! completes but breaks an invariant is not an error: it yields a report
//! carrying [`ConsistencyViolation`](crate::report::ConsistencyViolation)s.

use segsync::SyncError;
use thiserror::Error;

/// Main error type for driver operations
#[derive(Debug, Error)]
pub enum DriverError {
    /// Segment allocation or primitive construction failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The OS refused to start a worker thread
    ///
    /// Workers spawned before the failure are released without running, so
    /// none of them is left waiting on a participant that never arrives.
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked
    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: String },

    /// Scenario parameters out of range
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl DriverError {
    /// Check if the failure came from the environment rather than the caller
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            DriverError::Spawn { .. } | DriverError::Sync(SyncError::Unsupported(_))
        )
    }
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;
