//! Compute release port.

use crate::job::domain::JobId;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for compute release.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Releases the compute unit hosting a worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeTerminator: Send + Sync {
    /// Requests termination of the worker's compute unit.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError`] when the release request fails.
    async fn terminate(&self, job_id: JobId) -> ComputeResult<()>;
}

/// Errors returned when releasing compute.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComputeError {
    /// The release command could not be started.
    #[error("failed to start compute release: {0}")]
    Spawn(String),

    /// The release command reported failure.
    #[error("compute release failed: {0}")]
    Failed(String),
}
