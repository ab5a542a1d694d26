//! Engine and runner error model.

use depot_core::DomainError;
use depot_storage::StorageError;

/// Errors reported by [`crate::JobService`] operations.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("job data not found: {0}")]
    DataNotFound(String),
    /// Configuration fault: the deployment submitted a type nobody runs.
    #[error("no runner registered for job type: {0}")]
    UnknownJobType(String),
    #[error("a runner is already registered for job type: {0}")]
    DuplicateRunner(String),
    #[error("a job already exists with guid: {0}")]
    DuplicateGuid(String),
    #[error("progress percent out of range (0..=100): {0}")]
    InvalidProgress(u8),
    #[error("job service is shut down")]
    ShutDown,
    #[error(transparent)]
    InvalidId(#[from] DomainError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure signalled by a runner; recorded on the job as its fail timestamp.
#[derive(Debug, thiserror::Error)]
pub enum JobRunnerError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Service(#[from] JobServiceError),
    #[error("specification for {job_type_code} is not a {expected}")]
    SpecificationMismatch {
        job_type_code: String,
        expected: &'static str,
    },
    #[error("runner panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Failed(String),
}

impl JobRunnerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
