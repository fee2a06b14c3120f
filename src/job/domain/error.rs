//! Error types for job domain validation and parsing.

use super::JobStatus;
use thiserror::Error;

/// Errors returned while constructing or mutating domain job values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobDomainError {
    /// The job identifier is not a valid UUID.
    #[error("invalid job identifier: {0}")]
    InvalidJobId(String),

    /// The requested status edge is not part of the job lifecycle.
    #[error("invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Status the transition starts from.
        from: JobStatus,
        /// Requested target status.
        to: JobStatus,
    },

    /// A transition into `failed` was requested without a reason.
    #[error("transition to failed requires an error message")]
    MissingFailureReason,

    /// The stored status differs from the status a transition expected.
    #[error("job status mismatch: expected {expected}, found {actual}")]
    StatusMismatch {
        /// Status the caller expected.
        expected: JobStatus,
        /// Status actually recorded.
        actual: JobStatus,
    },
}

/// Error returned while parsing job statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);

/// Error returned while parsing job commands from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job command: {0}")]
pub struct ParseJobCommandError(pub String);

/// Error returned while parsing compute classes from configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown compute class: {0}")]
pub struct ParseComputeClassError(pub String);
