//! # Job Error Types
//!
//! Errors a caller can observe on the future returned for a submitted job,
//! and errors raised by execution-unit transports.
//!
//! ## Design Philosophy
//!
//! Only job-semantic failures travel back to the caller. Capacity problems and
//! stalled queues are handled inside the scheduler by retry and migration, so
//! a caller normally sees one of:
//! - `FunctionNotFound`: the unit has no function registered under the name
//! - `Application`: the job function itself failed
//!
//! The remaining variants describe the pool failing to serve the job at all.
//! Both families surface through the same `JobError`; `kind()` tells them
//! apart.
//!
//! ## Usage Example
//!
//! ```rust
//! use flock_api::errors::{ErrorKind, JobError};
//!
//! fn describe(error: &JobError) -> &'static str {
//!     match error.kind() {
//!         ErrorKind::Job => "the job failed",
//!         ErrorKind::Pool => "the pool could not run the job",
//!     }
//! }
//! ```

use thiserror::Error;

/// Error delivered to the caller of a submitted job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The execution unit has no function with the requested name.
    ///
    /// # Parameters
    /// * String - Name of the requested function
    #[error("The function doesn't exist: {0}")]
    FunctionNotFound(String),

    /// The job function returned an error or panicked.
    ///
    /// # Parameters
    /// * String - Error message produced by the job function
    #[error("{0}")]
    Application(String),

    /// Every worker is full and the pool is at its maximum size.
    #[error("Worker pool is saturated ({workers} workers at {max_jobs} jobs each)")]
    PoolSaturated { workers: usize, max_jobs: usize },

    /// The pool was shut down before the job completed.
    #[error("Worker pool is shut down")]
    PoolShutdown,

    /// The execution unit could not accept or run the job.
    #[error("Execution unit failure: {0}")]
    UnitFailure(String),

    /// The job's result channel was dropped without a delivery.
    #[error("Job result was lost before delivery")]
    Lost,

    /// A value could not be converted to or from the wire format.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a `JobError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The job ran (or was looked up) and failed on its own terms.
    Job,
    /// The pool could not serve the job.
    Pool,
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::FunctionNotFound(_) | JobError::Application(_) => ErrorKind::Job,
            JobError::PoolSaturated { .. }
            | JobError::PoolShutdown
            | JobError::UnitFailure(_)
            | JobError::Lost
            | JobError::Serialization(_) => ErrorKind::Pool,
        }
    }
}

impl From<serde_json::Error> for JobError {
    fn from(error: serde_json::Error) -> Self {
        JobError::Serialization(error.to_string())
    }
}

/// Errors raised by an execution unit transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Failed to start execution unit: {0}")]
    Spawn(String),
    #[error("Execution unit is closed")]
    Closed,
    #[error("Failed to deliver request to execution unit: {0}")]
    Send(String),
}
