//! Error types for job execution.

use thiserror::Error;

/// Boxed error a job may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// A run of the same job is already in flight
    #[error("Could not start job \"{0}\" as it was already running")]
    DuplicateRun(String),

    /// The job reported a failure, or its work returned an error
    #[error("{0}")]
    Failed(BoxError),

    /// The job's work panicked
    #[error("Job panicked: {0}")]
    Panicked(String),

    /// The run was force-stopped
    #[error("force-stopped")]
    ForceStopped,

    /// Stop was requested while no run was active
    #[error("Job \"{0}\" is not running")]
    NotRunning(String),

    /// The work finished without completing or failing the run
    #[error("Job \"{0}\" finished without reporting an outcome")]
    Abandoned(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JobError {
    /// Build a [`JobError::Failed`] from anything convertible to a boxed error.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        JobError::Failed(error.into())
    }

    /// Whether this error came from a force stop.
    pub fn is_force_stop(&self) -> bool {
        matches!(self, JobError::ForceStopped)
    }

    /// Whether this error is a rejected duplicate run.
    pub fn is_duplicate_run(&self) -> bool {
        matches!(self, JobError::DuplicateRun(_))
    }
}
