use thiserror::Error;

use flock_api::errors::{JobError, UnitError};

/// Errors raised by the worker pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
    #[error("Failed to start execution unit: {0}")]
    UnitSpawn(#[from] UnitError),
    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

impl From<PoolError> for JobError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::ShuttingDown => JobError::PoolShutdown,
            PoolError::UnitSpawn(e) => JobError::UnitFailure(e.to_string()),
            other => JobError::UnitFailure(other.to_string()),
        }
    }
}

/// Errors raised while decoding control bus frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Unknown control event {event} from worker {worker_id}")]
    UnknownEvent { event: u8, worker_id: String },
    #[error("Malformed control frame: {0}")]
    Malformed(String),
}
