//! Worker provisioning port.

use crate::job::domain::{ComputeClass, JobId};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for provisioning.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Request to start one worker for a job.
///
/// Carries the job identifier only; credentials and options are fetched by
/// the worker at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Job the worker will execute.
    pub job_id: JobId,
    /// Requested compute size.
    pub compute_class: ComputeClass,
}

/// Handle to a started worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedWorker {
    /// Provider-assigned instance identifier.
    pub instance_id: String,
}

/// Starts isolated workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkerProvisioner: Send + Sync {
    /// Starts a worker for `request.job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Transient`] for failures worth retrying and
    /// [`ProvisionError::Rejected`] otherwise.
    async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<ProvisionedWorker>;
}

/// Errors returned by provisioners.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    /// Capacity or throttling failure; the request may succeed if retried.
    #[error("transient provisioning failure: {0}")]
    Transient(String),

    /// Permanent failure.
    #[error("provisioning rejected: {0}")]
    Rejected(String),
}

impl ProvisionError {
    /// Returns whether the failure is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
